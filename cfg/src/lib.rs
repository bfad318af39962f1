pub mod cfg;
mod convert;
mod disconnect;
mod dump;
mod eliminate_dead;
mod eliminate_fallthrough;
mod error;
mod layout;

pub use self::cfg::{Basic, Block, Cfg, Cond, InstrId, Instruction, TailTarget, Terminator};
pub use convert::convert;
pub use eliminate_dead::eliminate_dead_blocks;
pub use eliminate_fallthrough::eliminate_fallthrough_blocks;
pub use error::{Error, Result};
pub use layout::CfgWithLayout;
