use thiserror::Error;

mod markers;
pub use markers::*;
mod linker;
pub use linker::*;
mod resolver;
pub use resolver::*;
mod segments;
pub use segments::*;
mod presentation;
pub use presentation::*;
mod signals;
pub use signals::*;
pub mod timeparse;

/// Timeline time in seconds.
pub type Seconds = f64;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("marker not found: {0}")]
    MarkerNotFound(MarkerId),
    #[error("marker index out of range: {0}")]
    IndexOutOfRange(usize),
    #[error("no drag session in progress")]
    NoDragSession,
    #[error("drag session already in progress")]
    DragInProgress,
}
