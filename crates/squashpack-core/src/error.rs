use thiserror::Error;

/// Errors surfaced by the block processor and its collaborators.
///
/// The type is `Clone` because the first asynchronous error is latched inside
/// the pipeline and returned again by every subsequent front-end call until
/// the processor is dropped. I/O failures are captured as their kind and
/// message for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquashError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("operation out of sequence: {0}")]
    Sequence(&'static str),
    #[error("unsupported block flags {0:#06x}")]
    Unsupported(u32),
    #[error("compressor failed: {0}")]
    Compressor(String),
    #[error("corrupted data: {0}")]
    Corrupted(&'static str),
}

impl From<std::io::Error> for SquashError {
    fn from(err: std::io::Error) -> Self {
        SquashError::Io(err.to_string())
    }
}
