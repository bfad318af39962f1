use ir::Label;

use crate::cfg::{Block, Cfg};
use crate::disconnect::disconnect;
use crate::eliminate_dead::eliminate_dead_blocks;
use crate::error::{Error, Result};
use crate::layout::CfgWithLayout;

// A relay with an empty body and a single outgoing edge adds nothing to the
// program; raising blocks are kept, since their exception edge is invisible
// to the successor count. An empty body already rules out every raise other
// than a Raise terminator, and that one has no normal successor.
fn is_fallthrough(cfg: &Cfg, block: &Block) -> bool {
    block.start != cfg.entry_label()
        && !block.is_trap_handler
        && block.body.is_empty()
        && !block.can_raise
        && {
            let succs = cfg.successor_labels(block, true, false);
            succs.len() == 1 && succs[0] != block.start
        }
}

fn fallthrough_blocks(cwl: &CfgWithLayout) -> Vec<Label> {
    let cfg = cwl.cfg();
    cfg.blocks()
        .filter(|b| is_fallthrough(cfg, b))
        .map(|b| b.start)
        .collect()
}

pub fn eliminate_fallthrough_blocks(cwl: &mut CfgWithLayout) -> Result<()> {
    if cwl.preserve_orig_labels() {
        return Err(Error::PreserveOrigLabels);
    }
    loop {
        let candidates = fallthrough_blocks(cwl);
        if candidates.is_empty() {
            break;
        }
        // collapsing a chain link can expose the next one; repeat until dry
        for label in candidates {
            // an earlier removal in this round can rewire the block into a
            // self-loop; check the shape again before touching it
            let still = cwl
                .cfg()
                .get_block(label)
                .map_or(false, |b| is_fallthrough(cwl.cfg(), b));
            if !still {
                continue;
            }
            log::debug!("skipping fallthrough block `{}` in `{}`", label, cwl.cfg().fun_name);
            disconnect(cwl, label)?;
        }
    }
    // rewiring can leave whole subgraphs unreachable
    eliminate_dead_blocks(cwl)
}
