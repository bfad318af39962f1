use ir::linear::{Func, InstKind};
use ir::{Cmp, FuncTarget, Label, Test, Value};
use util::{Map, Set};

use crate::cfg::{Basic, Block, Cfg, Cond, InstrId, Instruction, TailTarget, Terminator};
use crate::error::{Error, Result};
use crate::layout::CfgWithLayout;

struct IdGen {
    next: u32,
}

impl IdGen {
    fn new() -> Self {
        IdGen { next: 0 }
    }

    fn take(&mut self) -> InstrId {
        let id = InstrId(self.next);
        self.next += 1;
        id
    }
}

struct OpenBlock {
    start: Label,
    body: Vec<Instruction<Basic>>,
}

struct Builder {
    cfg: Cfg,
    layout: Vec<Label>,
    new_labels: Set<Label>,
    trap_handler_of: Map<Label, Label>,
    trap_depth_at: Map<Label, usize>,
    ids: IdGen,
    cur: Option<OpenBlock>,
}

// One pass over the stream. The trap depth travels through the loop as a
// plain value; every jump target and label start records the depth it is
// reached at, and any two records for one label must agree.
pub fn convert(f: Func, preserve_orig_labels: bool) -> Result<CfgWithLayout> {
    let (entry, entry_is_explicit) = match f.body.first().map(|i| &i.desc) {
        Some(InstKind::Label(l)) => (*l, true),
        _ => (Label::fresh(), false),
    };
    let tailrec_entry = f.tailrec_entry.unwrap_or(entry);

    let mut b = Builder {
        cfg: Cfg::new(f.name.clone(), entry, tailrec_entry),
        layout: vec![],
        new_labels: Set::default(),
        trap_handler_of: Map::default(),
        trap_depth_at: Map::default(),
        ids: IdGen::new(),
        cur: None,
    };
    if !entry_is_explicit {
        b.new_labels.insert(entry);
    }
    b.open(entry, 0)?;

    let mut trap_depth = 0usize;
    let mut idx = if entry_is_explicit { 1 } else { 0 };
    while idx < f.body.len() {
        let inst = &f.body[idx];
        let next = f.body.get(idx + 1).map(|i| &i.desc);
        match &inst.desc {
            InstKind::Label(l) => {
                b.fallthrough_to(*l, trap_depth)?;
            }
            InstKind::Op(op) => {
                b.push_basic(inst, Basic::Op(op.clone()), trap_depth);
            }
            InstKind::Call(call) => {
                b.push_basic(inst, Basic::Call(call.clone()), trap_depth);
            }
            InstKind::Prologue => {
                b.push_basic(inst, Basic::Prologue, trap_depth);
            }
            InstKind::Pushtrap { handler } => {
                b.register_trap_push(*handler, trap_depth)?;
                b.push_basic(inst, Basic::Pushtrap { handler: *handler }, trap_depth);
                trap_depth += 1;
            }
            InstKind::Poptrap => {
                let label = b.cur_label();
                b.push_basic(inst, Basic::Poptrap, trap_depth);
                trap_depth = trap_depth
                    .checked_sub(1)
                    .ok_or(Error::NegativeTrapDepth { label })?;
            }
            InstKind::AdjustTrap(delta) => {
                // emits nothing: reordering moves the place where the
                // adjustment is needed, so it is recomputed at emission
                let label = b.cur_label();
                let depth = trap_depth as isize + delta;
                if depth < 0 {
                    return Err(Error::NegativeTrapDepth { label });
                }
                trap_depth = depth as usize;
            }
            InstKind::Branch(target) => {
                b.record_trap_depth(*target, trap_depth)?;
                let term = b.make_instr(inst, Terminator::Branch(vec![(Cond::Always, *target)]), trap_depth);
                b.register(term)?;
                b.continue_after_branch(next, trap_depth)?;
            }
            InstKind::CondBranch(test, target) => {
                let (fall, synthesized) = b.fallthrough_label(next);
                b.record_trap_depth(*target, trap_depth)?;
                b.record_trap_depth(fall, trap_depth)?;
                let arms = vec![
                    (Cond::Test(*test), *target),
                    (Cond::Test(test.invert()), fall),
                ];
                let term = b.make_instr(inst, Terminator::Branch(arms), trap_depth);
                b.register(term)?;
                if synthesized && next.is_some() {
                    b.open(fall, trap_depth)?;
                }
            }
            InstKind::CondBranch3(lt, eq, gt) => {
                let (fall, synthesized) = b.fallthrough_label(next);
                let arms = vec![
                    (cmp_one(Cmp::Lt), lt.unwrap_or(fall)),
                    (cmp_one(Cmp::Eq), eq.unwrap_or(fall)),
                    (cmp_one(Cmp::Gt), gt.unwrap_or(fall)),
                ];
                for &(_, l) in &arms {
                    b.record_trap_depth(l, trap_depth)?;
                }
                let term = b.make_instr(inst, Terminator::Branch(arms), trap_depth);
                b.register(term)?;
                if synthesized && next.is_some() {
                    b.open(fall, trap_depth)?;
                }
            }
            InstKind::Switch(labels) => {
                for &l in labels.iter() {
                    b.record_trap_depth(l, trap_depth)?;
                }
                let term = b.make_instr(inst, Terminator::Switch(labels.clone()), trap_depth);
                let id = term.id;
                b.register(term)?;
                b.require_label_after(next, id)?;
            }
            InstKind::Return => {
                if trap_depth != 0 {
                    return Err(Error::ReturnInsideTrap {
                        label: b.cur_label(),
                        depth: trap_depth,
                    });
                }
                let term = b.make_instr(inst, Terminator::Return, trap_depth);
                let id = term.id;
                b.register(term)?;
                b.require_label_after(next, id)?;
            }
            InstKind::Raise(kind) => {
                let term = b.make_instr(inst, Terminator::Raise(*kind), trap_depth);
                let id = term.id;
                b.register(term)?;
                b.require_label_after(next, id)?;
            }
            InstKind::Tailcall(target) => {
                let target = match target {
                    FuncTarget::Direct(sym) if *sym == f.name => TailTarget::ToSelf,
                    other => TailTarget::ToFunc(other.clone()),
                };
                let term = b.make_instr(inst, Terminator::Tailcall(target), trap_depth);
                let id = term.id;
                b.register(term)?;
                b.require_label_after(next, id)?;
            }
        }
        idx += 1;
    }

    if let Some(open) = b.cur.take() {
        return Err(Error::MissingTerminator(open.start));
    }

    b.cfg.compute_predecessors()?;
    for (&handler, _) in &b.trap_handler_of {
        let block = b
            .cfg
            .get_block_mut(handler)
            .ok_or(Error::UnknownLabel(handler))?;
        block.is_trap_handler = true;
    }

    log::debug!(
        "built cfg for `{}`: {} blocks, {} synthesized labels",
        b.cfg.fun_name,
        b.cfg.num_blocks(),
        b.new_labels.len()
    );

    Ok(CfgWithLayout::new(
        b.cfg,
        b.layout,
        b.new_labels,
        preserve_orig_labels,
        b.trap_handler_of,
        b.trap_depth_at,
    ))
}

fn cmp_one(cmp: Cmp) -> Cond {
    Cond::Test(Test {
        cmp,
        rhs: Value::Imm(1),
    })
}

impl Builder {
    fn cur_label(&self) -> Label {
        match &self.cur {
            Some(open) => open.start,
            None => unreachable!("instruction outside any block"),
        }
    }

    fn open(&mut self, label: Label, trap_depth: usize) -> Result<()> {
        self.record_trap_depth(label, trap_depth)?;
        self.cur = Some(OpenBlock {
            start: label,
            body: vec![],
        });
        Ok(())
    }

    // An in-progress block falls through to an explicit label: close it with
    // an unconditional branch so the edge survives reordering.
    fn fallthrough_to(&mut self, label: Label, trap_depth: usize) -> Result<()> {
        if self.cur.is_some() {
            let term = self.synth_branch(label, trap_depth);
            self.register(term)?;
        }
        self.open(label, trap_depth)
    }

    fn fallthrough_label(&mut self, next: Option<&InstKind>) -> (Label, bool) {
        match next {
            Some(InstKind::Label(l)) => (*l, false),
            _ => {
                let l = Label::fresh();
                self.new_labels.insert(l);
                (l, true)
            }
        }
    }

    fn continue_after_branch(&mut self, next: Option<&InstKind>, trap_depth: usize) -> Result<()> {
        match next {
            None | Some(InstKind::Label(_)) => Ok(()),
            Some(_) => {
                // unlabelled code after a branch still needs a block of its
                // own; it is unreachable and left to dead-block removal
                let l = Label::fresh();
                self.new_labels.insert(l);
                self.open(l, trap_depth)
            }
        }
    }

    fn require_label_after(&self, next: Option<&InstKind>, id: InstrId) -> Result<()> {
        match next {
            None | Some(InstKind::Label(_)) => Ok(()),
            Some(_) => Err(Error::MissingLabelAfterTerminator { id }),
        }
    }

    fn push_basic(&mut self, src: &ir::linear::Inst, desc: Basic, trap_depth: usize) {
        let instr = self.make_instr(src, desc, trap_depth);
        match &mut self.cur {
            Some(open) => open.body.push(instr),
            None => unreachable!("instruction outside any block"),
        }
    }

    fn make_instr<D>(&mut self, src: &ir::linear::Inst, desc: D, trap_depth: usize) -> Instruction<D> {
        Instruction {
            desc,
            arg: src.arg.clone(),
            res: src.res.clone(),
            dbg: src.dbg,
            live: src.live.clone(),
            trap_depth,
            id: self.ids.take(),
        }
    }

    fn synth_branch(&mut self, target: Label, trap_depth: usize) -> Instruction<Terminator> {
        Instruction {
            desc: Terminator::Branch(vec![(Cond::Always, target)]),
            arg: vec![],
            res: vec![],
            dbg: (0, 0),
            live: Set::default(),
            trap_depth,
            id: self.ids.take(),
        }
    }

    fn register(&mut self, terminator: Instruction<Terminator>) -> Result<()> {
        let open = match self.cur.take() {
            Some(open) => open,
            None => unreachable!("terminator outside any block"),
        };
        let can_raise =
            open.body.iter().any(|i| i.desc.can_raise()) || terminator.desc.can_raise();
        let start = open.start;
        self.cfg.register_block(Block {
            start,
            body: open.body,
            terminator,
            predecessors: Set::default(),
            is_trap_handler: false, // set once all handler pushes are known
            can_raise,
        })?;
        self.layout.push(start);
        Ok(())
    }

    fn record_trap_depth(&mut self, label: Label, trap_depth: usize) -> Result<()> {
        match self.trap_depth_at.get(&label) {
            Some(&recorded) if recorded != trap_depth => Err(Error::TrapDepthMismatch {
                label,
                recorded,
                depth: trap_depth,
            }),
            Some(_) => Ok(()),
            None => {
                self.trap_depth_at.insert(label, trap_depth);
                Ok(())
            }
        }
    }

    fn register_trap_push(&mut self, handler: Label, trap_depth: usize) -> Result<()> {
        let pusher = self.cur_label();
        match self.trap_handler_of.get(&handler) {
            Some(&first) if first != pusher => {
                return Err(Error::DuplicateTrapHandler {
                    handler,
                    first,
                    second: pusher,
                })
            }
            Some(_) => {}
            None => {
                self.trap_handler_of.insert(handler, pusher);
            }
        }
        // the handler runs after the unwinder pops the frame being pushed
        self.record_trap_depth(handler, trap_depth)
    }
}
