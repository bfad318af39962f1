use std::fmt;
use std::io::{self, Write};

use crate::cfg::Block;
use crate::layout::CfgWithLayout;

// Layout order first, then whatever is registered but not laid out yet;
// such leftovers exist transiently during construction and still have to
// show up in a dump.
fn ordered_blocks(cwl: &CfgWithLayout) -> Vec<&Block> {
    let cfg = cwl.cfg();
    let mut out: Vec<&Block> = cwl.layout().iter().map(|&l| cfg.block(l)).collect();
    let mut rest: Vec<&Block> = cfg
        .blocks()
        .filter(|b| !cwl.layout().contains(&b.start))
        .collect();
    rest.sort_by_key(|b| b.start);
    out.append(&mut rest);
    out
}

impl fmt::Display for CfgWithLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cfg = self.cfg();
        write!(f, "function {} (entry {})\n", cfg.fun_name, cfg.entry_label())?;
        write!(f, "layout: ")?;
        util::format_vec(f, self.layout(), "[", ", ", "]")?;
        write!(f, "\n")?;
        let in_layout = self.layout().len();
        for (i, block) in ordered_blocks(self).iter().enumerate() {
            if i == in_layout {
                write!(f, "leftover blocks:\n")?;
            }
            block.format_indented(f, 1)?;
        }
        Ok(())
    }
}

impl CfgWithLayout {
    // Writes the graph in Graphviz dot format. For debugging.
    pub fn dot(&self, output: &mut dyn Write) -> io::Result<()> {
        let cfg = self.cfg();
        writeln!(output, "digraph \"{}\" {{", cfg.fun_name)?;
        for block in ordered_blocks(self) {
            write!(output, "  \"{}\" [shape=box;label=\"{}", block.start, block.start)?;
            if block.is_trap_handler {
                write!(output, " (trap handler)")?;
            }
            write!(output, ":\\n")?;
            for i in &block.body {
                write!(output, "{}\\n", i.desc)?;
            }
            writeln!(output, "{}\\n\"];", block.terminator.desc)?;
        }
        for block in ordered_blocks(self) {
            for (cond, succ) in cfg.successors_of(block) {
                writeln!(
                    output,
                    "  \"{}\" -> \"{}\" [label=\"{}\"];",
                    block.start, succ, cond
                )?;
            }
            if block.can_raise {
                if let Some(handler) = block.active_trap_handler() {
                    writeln!(
                        output,
                        "  \"{}\" -> \"{}\" [style=dashed];",
                        block.start, handler
                    )?;
                }
            }
        }
        writeln!(output, "}}")
    }
}
