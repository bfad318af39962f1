use std::fmt;

use ir::{CallKind, Cmp, FuncTarget, Label, OpKind, RaiseKind, Reg, Test, Value};
use util::{Map, Set, Span};

use crate::error::{Error, Result};

// Position of an instruction in the linear stream of one translation run.
// Ids are handed out by one builder invocation and are meaningless across
// functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub(crate) u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<D> {
    pub desc: D,
    pub arg: Vec<Reg>,
    pub res: Vec<Reg>,
    pub dbg: Span,
    pub live: Set<Reg>,
    pub trap_depth: usize,
    pub id: InstrId,
}

// Everything that can sit in a block body. Control never leaves the block
// through these; calls return to the next instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Basic {
    Op(OpKind),
    Call(CallKind),
    Prologue,
    Pushtrap { handler: Label },
    Poptrap,
}

impl Basic {
    pub fn can_raise(&self) -> bool {
        match self {
            Basic::Call(call) => call.can_raise(),
            _ => false,
        }
    }
}

impl fmt::Display for Basic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Basic::Op(op) => write!(f, "{op}"),
            Basic::Call(call) => write!(f, "{call}"),
            Basic::Prologue => write!(f, "Prologue"),
            Basic::Pushtrap { handler } => write!(f, "Pushtrap {handler}"),
            Basic::Poptrap => write!(f, "Poptrap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Always,
    Test(Test),
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cond::Always => write!(f, "always"),
            Cond::Test(t) => write!(f, "{t}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailTarget {
    // Edge to the function's own tail-recursion entry, not to any symbol.
    ToSelf,
    ToFunc(FuncTarget),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Branch(Vec<(Cond, Label)>),
    Switch(Box<[Label]>),
    Return,
    Raise(RaiseKind),
    Tailcall(TailTarget),
}

impl Terminator {
    pub fn can_raise(&self) -> bool {
        matches!(self, Terminator::Raise(_))
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Terminator::Branch(arms) => {
                write!(f, "Branch [")?;
                for (i, (cond, l)) in arms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({cond}, {l})")?;
                }
                write!(f, "]")
            }
            Terminator::Switch(labels) => {
                write!(f, "Switch ")?;
                util::format_vec(f, labels, "[", ", ", "]")
            }
            Terminator::Return => write!(f, "Return"),
            Terminator::Raise(kind) => write!(f, "Raise {:?}", kind),
            Terminator::Tailcall(TailTarget::ToSelf) => write!(f, "Tailcall self"),
            Terminator::Tailcall(TailTarget::ToFunc(target)) => write!(f, "Tailcall {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub start: Label,
    pub body: Vec<Instruction<Basic>>,
    pub terminator: Instruction<Terminator>,
    pub predecessors: Set<Label>,
    pub is_trap_handler: bool,
    pub can_raise: bool,
}

impl Block {
    // Handler of the innermost trap still open at the end of the block, if
    // any. Walking backwards, a Poptrap cancels the next Pushtrap met.
    pub fn active_trap_handler(&self) -> Option<Label> {
        let mut popped = 0usize;
        for i in self.body.iter().rev() {
            match i.desc {
                Basic::Poptrap => popped += 1,
                Basic::Pushtrap { handler } => {
                    if popped == 0 {
                        return Some(handler);
                    }
                    popped -= 1;
                }
                _ => {}
            }
        }
        None
    }

    pub(crate) fn format_indented(&self, f: &mut fmt::Formatter, level: usize) -> fmt::Result {
        // print indentation
        let indent = |level: usize| "    ".repeat(level);
        write!(f, "{}block {}", indent(level), self.start)?;
        if self.is_trap_handler {
            write!(f, " (trap handler)")?;
        }
        if self.can_raise {
            write!(f, " (can raise)")?;
        }
        write!(f, "\n{}predecessors: ", indent(level + 1))?;
        let mut preds: Vec<_> = self.predecessors.iter().collect();
        preds.sort();
        util::format_vec(f, &preds, "[", ", ", "]")?;
        write!(f, "\n{}body:\n", indent(level + 1))?;
        for i in &self.body {
            write!(f, "{}{}\n", indent(level + 2), i)?;
        }
        write!(f, "{}terminator: {}\n", indent(level + 1), self.terminator)
    }
}

impl<D: fmt::Display> fmt::Display for Instruction<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ", self.id)?;
        if !self.res.is_empty() {
            util::format_vec(f, &self.res, "", ", ", "")?;
            write!(f, " <- ")?;
        }
        write!(f, "{}", self.desc)?;
        if !self.arg.is_empty() {
            write!(f, " ")?;
            util::format_vec(f, &self.arg, "", ", ", "")?;
        }
        if self.trap_depth > 0 {
            write!(f, " (trap depth {})", self.trap_depth)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cfg {
    blocks: Map<Label, Block>,
    pub fun_name: String,
    entry_label: Label,
    tailrec_entry_label: Label,
}

impl Cfg {
    pub(crate) fn new(fun_name: String, entry_label: Label, tailrec_entry_label: Label) -> Self {
        Cfg {
            blocks: Map::default(),
            fun_name,
            entry_label,
            tailrec_entry_label,
        }
    }

    pub fn entry_label(&self) -> Label {
        self.entry_label
    }

    pub fn tailrec_entry_label(&self) -> Label {
        self.tailrec_entry_label
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn get_block(&self, label: Label) -> Option<&Block> {
        self.blocks.get(&label)
    }

    pub fn get_block_mut(&mut self, label: Label) -> Option<&mut Block> {
        self.blocks.get_mut(&label)
    }

    // Edges only ever reference registered blocks, so a miss here is a bug
    // in this crate or its producer, not an input condition.
    pub fn block(&self, label: Label) -> &Block {
        match self.blocks.get(&label) {
            Some(b) => b,
            None => panic!("no block `{}` in `{}`", label, self.fun_name),
        }
    }

    pub fn block_mut(&mut self, label: Label) -> &mut Block {
        match self.blocks.get_mut(&label) {
            Some(b) => b,
            None => panic!("no block `{}` in `{}`", label, self.fun_name),
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.blocks.keys().copied()
    }

    pub(crate) fn register_block(&mut self, block: Block) -> Result<()> {
        if self.blocks.contains_key(&block.start) {
            return Err(Error::DuplicateLabel(block.start));
        }
        self.blocks.insert(block.start, block);
        Ok(())
    }

    pub(crate) fn remove_block(&mut self, label: Label) -> Result<Block> {
        if label == self.entry_label {
            return Err(Error::RemovedEntry(label));
        }
        self.blocks.remove(&label).ok_or(Error::UnknownLabel(label))
    }

    pub fn successors_of(&self, block: &Block) -> Vec<(Cond, Label)> {
        match &block.terminator.desc {
            Terminator::Branch(arms) => arms.clone(),
            Terminator::Switch(labels) => labels
                .iter()
                .enumerate()
                .map(|(i, l)| {
                    let test = Test {
                        cmp: Cmp::Eq,
                        rhs: Value::Imm(i as i64),
                    };
                    (Cond::Test(test), *l)
                })
                .collect(),
            Terminator::Return | Terminator::Raise(_) => vec![],
            Terminator::Tailcall(TailTarget::ToSelf) => {
                vec![(Cond::Always, self.tailrec_entry_label)]
            }
            Terminator::Tailcall(TailTarget::ToFunc(_)) => vec![],
        }
    }

    // Distinct successor labels; exception-propagation edges are not part of
    // the terminator and are only reported when `exn` is requested.
    pub fn successor_labels(&self, block: &Block, normal: bool, exn: bool) -> Vec<Label> {
        let mut out = vec![];
        if normal {
            for (_, l) in self.successors_of(block) {
                if !out.contains(&l) {
                    out.push(l);
                }
            }
        }
        if exn && block.can_raise {
            if let Some(h) = block.active_trap_handler() {
                if !out.contains(&h) {
                    out.push(h);
                }
            }
        }
        out
    }

    // Deferred until all blocks exist: forward jumps reference blocks that
    // are not registered when the edge is first seen.
    pub(crate) fn compute_predecessors(&mut self) -> Result<()> {
        let mut edges = vec![];
        for block in self.blocks.values() {
            for (_, succ) in self.successors_of(block) {
                edges.push((block.start, succ));
            }
        }
        for (pred, succ) in edges {
            let block = self
                .blocks
                .get_mut(&succ)
                .ok_or(Error::UnknownLabel(succ))?;
            block.predecessors.insert(pred);
        }
        Ok(())
    }
}
