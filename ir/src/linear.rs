use std::fmt;

use util::{Set, Span};

use crate::common::*;

// The instruction stream as it leaves instruction selection: straight-line
// code addressed by labels, jumps by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    Label(Label),
    Op(OpKind),
    Call(CallKind),
    Prologue,
    Pushtrap { handler: Label },
    Poptrap,
    AdjustTrap(isize),
    Branch(Label),
    CondBranch(Test, Label),
    CondBranch3(Option<Label>, Option<Label>, Option<Label>),
    Switch(Box<[Label]>),
    Return,
    Raise(RaiseKind),
    Tailcall(FuncTarget),
}

impl fmt::Display for InstKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use InstKind::*;
        match self {
            Label(l) => write!(f, "{l}:"),
            Op(op) => write!(f, "{op}"),
            Call(call) => write!(f, "{call}"),
            Prologue => write!(f, "Prologue"),
            Pushtrap { handler } => write!(f, "Pushtrap {handler}"),
            Poptrap => write!(f, "Poptrap"),
            AdjustTrap(delta) => write!(f, "AdjustTrap {delta}"),
            Branch(l) => write!(f, "Branch {l}"),
            CondBranch(t, l) => write!(f, "Branch if {t} to {l}"),
            CondBranch3(lt, eq, gt) => {
                let arm = |o: &Option<crate::common::Label>| match o {
                    Some(l) => l.to_string(),
                    None => "-".to_string(),
                };
                write!(f, "Branch3 {}, {}, {}", arm(lt), arm(eq), arm(gt))
            }
            Switch(labels) => {
                write!(f, "Switch ")?;
                util::format_vec(f, labels, "[", ", ", "]")
            }
            Return => write!(f, "Return"),
            Raise(kind) => write!(f, "Raise {:?}", kind),
            Tailcall(target) => write!(f, "Tailcall {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub desc: InstKind,
    pub arg: Vec<Reg>,
    pub res: Vec<Reg>,
    pub dbg: Span,
    pub live: Set<Reg>,
}

impl Inst {
    pub fn new(desc: InstKind) -> Self {
        Inst {
            desc,
            arg: vec![],
            res: vec![],
            dbg: (0, 0),
            live: Set::default(),
        }
    }
}

// One function body. `tailrec_entry` is the post-prologue re-entry point for
// self tail-calls, when it differs from the first block.
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: String,
    pub body: Vec<Inst>,
    pub tailrec_entry: Option<Label>,
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for i in &self.body {
            match i.desc {
                InstKind::Label(_) => writeln!(f, "{}", i.desc)?,
                _ => writeln!(f, "    {}", i.desc)?,
            }
        }
        Ok(())
    }
}
