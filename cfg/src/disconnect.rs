use ir::Label;

use crate::cfg::Terminator;
use crate::error::Result;
use crate::layout::CfgWithLayout;

// Unlinks one block, pointing every edge that entered it at its own
// successor instead. The elimination passes only call this on blocks with no
// predecessors or with exactly one normal successor; predecessor sets of the
// neighbours are patched in place, never recomputed from scratch.
pub(crate) fn disconnect(cwl: &mut CfgWithLayout, label: Label) -> Result<()> {
    let cfg = cwl.cfg_mut();
    let block = cfg.block(label);
    let succs = cfg.successor_labels(block, true, false);
    let preds: Vec<Label> = block.predecessors.iter().copied().collect();

    if preds.is_empty() {
        for &s in &succs {
            // a successor may already be gone within one removal sweep
            if let Some(succ) = cfg.get_block_mut(s) {
                succ.predecessors.remove(&label);
            }
        }
    } else {
        assert!(succs.len() == 1, "disconnecting `{label}` with {} successors", succs.len());
        let target = succs[0];
        for &p in &preds {
            let pred = cfg.block_mut(p);
            match &mut pred.terminator.desc {
                Terminator::Branch(arms) => {
                    for (_, l) in arms.iter_mut() {
                        if *l == label {
                            *l = target;
                        }
                    }
                }
                Terminator::Switch(labels) => {
                    for l in labels.iter_mut() {
                        if *l == label {
                            *l = target;
                        }
                    }
                }
                Terminator::Return | Terminator::Raise(_) | Terminator::Tailcall(_) => {
                    unreachable!("predecessor `{p}` of `{label}` has no rewritable edges")
                }
            }
        }
        let succ = cfg.block_mut(target);
        succ.predecessors.remove(&label);
        for &p in &preds {
            succ.predecessors.insert(p);
        }
    }

    cwl.remove_block(label)
}
