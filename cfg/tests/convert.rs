use cfg::{convert, Basic, Cond, Error, TailTarget, Terminator};
use ir::linear::{Func, Inst, InstKind};
use ir::{CallKind, Cmp, Label, OpKind, Test, Value};

fn func(name: &str, body: Vec<InstKind>) -> Func {
    Func {
        name: name.to_string(),
        body: body.into_iter().map(Inst::new).collect(),
        tailrec_entry: None,
    }
}

fn test_eq_zero() -> Test {
    Test {
        cmp: Cmp::Eq,
        rhs: Value::Imm(0),
    }
}

#[test]
fn two_blocks_from_straight_line() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Prologue,
            InstKind::Branch(l1),
            InstKind::Label(l1),
            InstKind::Op(OpKind::Move),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();

    assert_eq!(cfg.num_blocks(), 2);
    assert_eq!(cfg.entry_label(), l0);
    assert_eq!(cwl.layout(), &[l0, l1]);
    assert!(cwl.new_labels().is_empty());

    let b0 = cfg.block(l0);
    assert_eq!(b0.body.len(), 1);
    assert_eq!(b0.body[0].desc, Basic::Prologue);
    assert_eq!(
        b0.terminator.desc,
        Terminator::Branch(vec![(Cond::Always, l1)])
    );
    assert!(b0.predecessors.is_empty());

    let b1 = cfg.block(l1);
    assert_eq!(b1.body.len(), 1);
    assert_eq!(b1.body[0].desc, Basic::Op(OpKind::Move));
    assert_eq!(b1.terminator.desc, Terminator::Return);
    assert_eq!(b1.predecessors.len(), 1);
    assert!(b1.predecessors.contains(&l0));
}

#[test]
fn cond_branch_synthesizes_fallthrough() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::CondBranch(test_eq_zero(), l1),
            InstKind::Op(OpKind::Move),
            InstKind::Return,
            InstKind::Label(l1),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();

    assert_eq!(cfg.num_blocks(), 3);
    assert_eq!(cwl.new_labels().len(), 1);
    let fall = *cwl.new_labels().iter().next().unwrap();
    assert!(fall != l0 && fall != l1);
    assert_eq!(cwl.layout(), &[l0, fall, l1]);

    let b0 = cfg.block(l0);
    assert_eq!(
        b0.terminator.desc,
        Terminator::Branch(vec![
            (Cond::Test(test_eq_zero()), l1),
            (Cond::Test(test_eq_zero().invert()), fall),
        ])
    );
    assert!(cfg.block(fall).predecessors.contains(&l0));
    assert_eq!(cfg.block(fall).body[0].desc, Basic::Op(OpKind::Move));
}

#[test]
fn cond_branch_uses_next_label_as_fallthrough() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let l2 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::CondBranch(test_eq_zero(), l1),
            InstKind::Label(l2),
            InstKind::Return,
            InstKind::Label(l1),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    assert!(cwl.new_labels().is_empty());
    let b0 = cwl.cfg().block(l0);
    assert_eq!(
        b0.terminator.desc,
        Terminator::Branch(vec![
            (Cond::Test(test_eq_zero()), l1),
            (Cond::Test(test_eq_zero().invert()), l2),
        ])
    );
}

#[test]
fn three_way_branch_defaults_to_fallthrough() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let l3 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::CondBranch3(Some(l1), None, Some(l3)),
            InstKind::Op(OpKind::Move),
            InstKind::Return,
            InstKind::Label(l1),
            InstKind::Return,
            InstKind::Label(l3),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let fall = *cwl.new_labels().iter().next().unwrap();

    let lt = Cond::Test(Test {
        cmp: Cmp::Lt,
        rhs: Value::Imm(1),
    });
    let eq = Cond::Test(Test {
        cmp: Cmp::Eq,
        rhs: Value::Imm(1),
    });
    let gt = Cond::Test(Test {
        cmp: Cmp::Gt,
        rhs: Value::Imm(1),
    });
    assert_eq!(
        cwl.cfg().block(l0).terminator.desc,
        Terminator::Branch(vec![(lt, l1), (eq, fall), (gt, l3)])
    );
}

#[test]
fn switch_lowers_to_indexed_edges() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let l2 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Switch(vec![l1, l2].into()),
            InstKind::Label(l1),
            InstKind::Return,
            InstKind::Label(l2),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();
    let b0 = cfg.block(l0);
    assert_eq!(cfg.successor_labels(b0, true, false), vec![l1, l2]);
    assert!(cfg.block(l1).predecessors.contains(&l0));
    assert!(cfg.block(l2).predecessors.contains(&l0));
}

#[test]
fn switch_must_be_followed_by_label() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Switch(vec![l1].into()),
            InstKind::Op(OpKind::Move),
            InstKind::Return,
            InstKind::Label(l1),
            InstKind::Return,
        ],
    );
    assert!(matches!(
        convert(f, false),
        Err(Error::MissingLabelAfterTerminator { .. })
    ));
}

#[test]
fn return_at_end_of_stream_is_fine() {
    let l0 = Label::fresh();
    let f = func("f", vec![InstKind::Label(l0), InstKind::Return]);
    assert!(convert(f, false).is_ok());
}

#[test]
fn return_inside_protected_region_fails() {
    let l0 = Label::fresh();
    let h = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Pushtrap { handler: h },
            InstKind::Return,
            InstKind::Label(h),
            InstKind::Return,
        ],
    );
    assert_eq!(
        convert(f, false),
        Err(Error::ReturnInsideTrap {
            label: l0,
            depth: 1
        })
    );
}

#[test]
fn poptrap_below_zero_fails() {
    let l0 = Label::fresh();
    let f = func(
        "f",
        vec![InstKind::Label(l0), InstKind::Poptrap, InstKind::Return],
    );
    assert_eq!(
        convert(f, false),
        Err(Error::NegativeTrapDepth { label: l0 })
    );
}

#[test]
fn adjust_trap_emits_no_instruction() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let h = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Pushtrap { handler: h },
            InstKind::Branch(l1),
            InstKind::Label(l1),
            InstKind::AdjustTrap(-1),
            InstKind::Return,
            InstKind::Label(h),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let b1 = cwl.cfg().block(l1);
    assert!(b1.body.is_empty());
    assert_eq!(cwl.trap_depth_at(l1), Some(1));
    assert_eq!(cwl.trap_depth_at(h), Some(0));
}

#[test]
fn adjust_trap_below_zero_fails() {
    let l0 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::AdjustTrap(-1),
            InstKind::Return,
        ],
    );
    assert_eq!(
        convert(f, false),
        Err(Error::NegativeTrapDepth { label: l0 })
    );
}

#[test]
fn handler_pushed_from_two_blocks_fails() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let h = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Pushtrap { handler: h },
            InstKind::Poptrap,
            InstKind::Branch(l1),
            InstKind::Label(l1),
            InstKind::Pushtrap { handler: h },
            InstKind::Poptrap,
            InstKind::Return,
            InstKind::Label(h),
            InstKind::Return,
        ],
    );
    assert_eq!(
        convert(f, false),
        Err(Error::DuplicateTrapHandler {
            handler: h,
            first: l0,
            second: l1
        })
    );
}

#[test]
fn handler_repushed_from_same_block_is_fine() {
    let l0 = Label::fresh();
    let h = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Pushtrap { handler: h },
            InstKind::Poptrap,
            InstKind::Pushtrap { handler: h },
            InstKind::Poptrap,
            InstKind::Return,
            InstKind::Label(h),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    assert_eq!(cwl.trap_handler_of(h), Some(l0));
}

#[test]
fn conflicting_trap_depths_fail() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let l2 = Label::fresh();
    let h = Label::fresh();
    // l2 is reached at depth 0 from l0 and at depth 1 from l1
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Branch(l2),
            InstKind::Label(l1),
            InstKind::Pushtrap { handler: h },
            InstKind::Branch(l2),
            InstKind::Label(l2),
            InstKind::Return,
            InstKind::Label(h),
            InstKind::Return,
        ],
    );
    assert!(matches!(
        convert(f, false),
        Err(Error::TrapDepthMismatch { .. })
    ));
}

#[test]
fn unterminated_block_fails() {
    let l0 = Label::fresh();
    let f = func(
        "f",
        vec![InstKind::Label(l0), InstKind::Op(OpKind::Move)],
    );
    assert_eq!(convert(f, false), Err(Error::MissingTerminator(l0)));
}

#[test]
fn duplicate_label_fails() {
    let l0 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Return,
            InstKind::Label(l0),
            InstKind::Return,
        ],
    );
    assert_eq!(convert(f, false), Err(Error::DuplicateLabel(l0)));
}

#[test]
fn self_tailcall_points_at_tailrec_entry() {
    let l0 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Tailcall(ir::FuncTarget::Direct("f".to_string())),
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();
    let b0 = cfg.block(l0);
    assert_eq!(b0.terminator.desc, Terminator::Tailcall(TailTarget::ToSelf));
    assert_eq!(cfg.successor_labels(b0, true, false), vec![l0]);
    assert!(b0.predecessors.contains(&l0));
}

#[test]
fn self_tailcall_with_distinct_reentry() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let f = Func {
        name: "f".to_string(),
        body: vec![
            Inst::new(InstKind::Label(l0)),
            Inst::new(InstKind::Prologue),
            Inst::new(InstKind::Branch(l1)),
            Inst::new(InstKind::Label(l1)),
            Inst::new(InstKind::Op(OpKind::Move)),
            Inst::new(InstKind::Tailcall(ir::FuncTarget::Direct("f".to_string()))),
        ],
        tailrec_entry: Some(l1),
    };
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();
    assert_eq!(cfg.tailrec_entry_label(), l1);
    let b1 = cfg.block(l1);
    assert_eq!(cfg.successor_labels(b1, true, false), vec![l1]);
    assert!(b1.predecessors.contains(&l0));
    assert!(b1.predecessors.contains(&l1));
}

#[test]
fn foreign_tailcall_has_no_edge() {
    let l0 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Tailcall(ir::FuncTarget::Direct("g".to_string())),
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();
    let b0 = cfg.block(l0);
    assert_eq!(
        b0.terminator.desc,
        Terminator::Tailcall(TailTarget::ToFunc(ir::FuncTarget::Direct("g".to_string())))
    );
    assert!(cfg.successor_labels(b0, true, false).is_empty());
}

#[test]
fn unlabelled_entry_is_synthesized() {
    let f = func("f", vec![InstKind::Op(OpKind::Move), InstKind::Return]);
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();
    assert_eq!(cfg.num_blocks(), 1);
    assert_eq!(cwl.new_labels().len(), 1);
    assert!(cwl.new_labels().contains(&cfg.entry_label()));
    assert_eq!(cwl.layout(), &[cfg.entry_label()]);
}

#[test]
fn unlabelled_code_after_branch_gets_a_block() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Branch(l1),
            InstKind::Op(OpKind::Move),
            InstKind::Return,
            InstKind::Label(l1),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    assert_eq!(cwl.cfg().num_blocks(), 3);
    assert_eq!(cwl.new_labels().len(), 1);
    let synth = *cwl.new_labels().iter().next().unwrap();
    assert!(cwl.cfg().block(synth).predecessors.is_empty());
}

#[test]
fn trap_bookkeeping_and_exception_successors() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let h = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Pushtrap { handler: h },
            InstKind::Call(CallKind::Direct("g".to_string())),
            InstKind::Branch(l1),
            InstKind::Label(l1),
            InstKind::Poptrap,
            InstKind::Return,
            InstKind::Label(h),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();

    assert!(cwl.is_trap_handler(h));
    assert!(!cwl.is_trap_handler(l0));
    assert_eq!(cwl.trap_handler_of(h), Some(l0));
    assert_eq!(cwl.trap_depth_at(l0), Some(0));
    assert_eq!(cwl.trap_depth_at(l1), Some(1));
    assert_eq!(cwl.trap_depth_at(h), Some(0));

    let b0 = cfg.block(l0);
    assert!(b0.can_raise);
    assert_eq!(cfg.successor_labels(b0, true, true), vec![l1, h]);
    assert_eq!(cfg.successor_labels(b0, false, true), vec![h]);
    // the handler is not an ordinary predecessor target
    assert!(cfg.block(h).predecessors.is_empty());
}

#[test]
fn predecessors_match_a_recomputation() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let l2 = Label::fresh();
    let l3 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::CondBranch(test_eq_zero(), l2),
            InstKind::Label(l1),
            InstKind::Op(OpKind::Move),
            InstKind::Branch(l3),
            InstKind::Label(l2),
            InstKind::Branch(l3),
            InstKind::Label(l3),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let cfg = cwl.cfg();

    for block in cfg.blocks() {
        let mut expected = vec![];
        for other in cfg.blocks() {
            let succs = cfg.successor_labels(other, true, false);
            if succs.contains(&block.start) && !expected.contains(&other.start) {
                expected.push(other.start);
            }
        }
        let mut got: Vec<_> = block.predecessors.iter().copied().collect();
        got.sort();
        expected.sort();
        assert_eq!(got, expected, "predecessors of {}", block.start);
    }
}

#[test]
fn every_instruction_id_resolves_to_its_block() {
    let l0 = Label::fresh();
    let l1 = Label::fresh();
    let f = func(
        "f",
        vec![
            InstKind::Label(l0),
            InstKind::Prologue,
            InstKind::Op(OpKind::Const(7)),
            InstKind::Branch(l1),
            InstKind::Label(l1),
            InstKind::Op(OpKind::Move),
            InstKind::Return,
        ],
    );
    let cwl = convert(f, false).unwrap();
    let map = cwl.id_to_label();

    let mut count = 0;
    for &label in cwl.layout() {
        let block = cwl.cfg().block(label);
        for i in &block.body {
            assert_eq!(map.get(&i.id), Some(&label));
            count += 1;
        }
        assert_eq!(map.get(&block.terminator.id), Some(&label));
        count += 1;
    }
    assert_eq!(map.len(), count);
}
