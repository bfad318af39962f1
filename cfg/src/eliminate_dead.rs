use ir::Label;

use crate::disconnect::disconnect;
use crate::error::{Error, Result};
use crate::layout::CfgWithLayout;

// Trap handlers are entered through exception edges that predecessor sets do
// not carry, so they are never treated as dead here.
fn dead_blocks(cwl: &CfgWithLayout) -> Vec<Label> {
    let cfg = cwl.cfg();
    cfg.blocks()
        .filter(|b| {
            b.predecessors.is_empty() && !b.is_trap_handler && b.start != cfg.entry_label()
        })
        .map(|b| b.start)
        .collect()
}

pub fn eliminate_dead_blocks(cwl: &mut CfgWithLayout) -> Result<()> {
    if cwl.preserve_orig_labels() {
        return Err(Error::PreserveOrigLabels);
    }
    loop {
        let dead = dead_blocks(cwl);
        if dead.is_empty() {
            return Ok(());
        }
        // removing a block can orphan its successors; sweep again
        for label in dead {
            log::debug!("removing dead block `{}` in `{}`", label, cwl.cfg().fun_name);
            disconnect(cwl, label)?;
        }
    }
}
