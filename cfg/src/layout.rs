use ir::Label;
use util::{Map, Set};

use crate::cfg::{Cfg, InstrId};
use crate::error::{Error, Result};

// A CFG tied to the block order used for linear emission, plus the
// bookkeeping that re-linearization needs: which labels were invented during
// construction, which block pushed each trap handler, and the trap depth in
// effect at each label.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgWithLayout {
    cfg: Cfg,
    layout: Vec<Label>,
    new_labels: Set<Label>,
    preserve_orig_labels: bool,
    trap_handler_of: Map<Label, Label>,
    trap_depth_at: Map<Label, usize>,
}

impl CfgWithLayout {
    pub(crate) fn new(
        cfg: Cfg,
        layout: Vec<Label>,
        new_labels: Set<Label>,
        preserve_orig_labels: bool,
        trap_handler_of: Map<Label, Label>,
        trap_depth_at: Map<Label, usize>,
    ) -> Self {
        CfgWithLayout {
            cfg,
            layout,
            new_labels,
            preserve_orig_labels,
            trap_handler_of,
            trap_depth_at,
        }
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn cfg_mut(&mut self) -> &mut Cfg {
        &mut self.cfg
    }

    pub fn layout(&self) -> &[Label] {
        &self.layout
    }

    pub fn new_labels(&self) -> &Set<Label> {
        &self.new_labels
    }

    pub fn preserve_orig_labels(&self) -> bool {
        self.preserve_orig_labels
    }

    pub fn is_trap_handler(&self, label: Label) -> bool {
        self.cfg
            .get_block(label)
            .map_or(false, |b| b.is_trap_handler)
    }

    pub fn trap_handler_of(&self, handler: Label) -> Option<Label> {
        self.trap_handler_of.get(&handler).copied()
    }

    pub fn trap_depth_at(&self, label: Label) -> Option<usize> {
        self.trap_depth_at.get(&label).copied()
    }

    // The caller is expected to reorder the existing layout, never to invent
    // a different block set.
    pub fn set_layout(&mut self, new_layout: Vec<Label>) -> Result<()> {
        match new_layout.first() {
            Some(&first) if first == self.cfg.entry_label() => {}
            _ => {
                return Err(Error::InvalidLayout(format!(
                    "first label must be the entry label `{}`",
                    self.cfg.entry_label()
                )))
            }
        }
        if new_layout.len() != self.cfg.num_blocks() {
            return Err(Error::InvalidLayout(format!(
                "{} labels given, {} blocks registered",
                new_layout.len(),
                self.cfg.num_blocks()
            )));
        }
        let seen: Set<Label> = new_layout.iter().copied().collect();
        if seen.len() != new_layout.len() {
            return Err(Error::InvalidLayout("duplicate label".to_string()));
        }
        for &l in &new_layout {
            if self.cfg.get_block(l).is_none() {
                return Err(Error::InvalidLayout(format!("`{l}` is not a block")));
            }
        }
        self.layout = new_layout;
        Ok(())
    }

    // The only way the graph shrinks: the block, its layout slot and its
    // bookkeeping entries go together, so none of them can drift.
    pub fn remove_block(&mut self, label: Label) -> Result<()> {
        self.cfg.remove_block(label)?;
        self.layout.retain(|&l| l != label);
        self.new_labels.remove(&label);
        self.trap_handler_of
            .retain(|&handler, &mut pusher| handler != label && pusher != label);
        self.trap_depth_at.remove(&label);
        Ok(())
    }

    pub fn id_to_label(&self) -> Map<InstrId, Label> {
        let mut map = Map::default();
        for &label in &self.layout {
            let block = self.cfg.block(label);
            for i in &block.body {
                map.insert(i.id, label);
            }
            map.insert(block.terminator.id, label);
        }
        map
    }
}
