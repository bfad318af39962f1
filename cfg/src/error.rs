use thiserror::Error;

use ir::Label;

use crate::cfg::InstrId;

// Every variant is an invariant violation: the stream comes from a trusted
// selection stage, so none of these are recoverable. The caller aborts the
// translation of the current function.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("block `{0}` is registered twice")]
    DuplicateLabel(Label),
    #[error("conflicting trap depths for `{label}`: recorded {recorded}, now {depth}")]
    TrapDepthMismatch {
        label: Label,
        recorded: usize,
        depth: usize,
    },
    #[error("trap depth becomes negative in block `{label}`")]
    NegativeTrapDepth { label: Label },
    #[error("return from block `{label}` at trap depth {depth}")]
    ReturnInsideTrap { label: Label, depth: usize },
    #[error("terminator {id} is not followed by a label")]
    MissingLabelAfterTerminator { id: InstrId },
    #[error("trap handler `{handler}` pushed from both `{first}` and `{second}`")]
    DuplicateTrapHandler {
        handler: Label,
        first: Label,
        second: Label,
    },
    #[error("stream ends inside unterminated block `{0}`")]
    MissingTerminator(Label),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    #[error("cannot remove blocks while original labels are preserved")]
    PreserveOrigLabels,
    #[error("unknown block `{0}`")]
    UnknownLabel(Label),
    #[error("entry block `{0}` cannot be removed")]
    RemovedEntry(Label),
}

pub type Result<T> = std::result::Result<T, Error>;
