pub mod lz4;

pub use lz4::Lz4Compressor;

use crate::types::Result;

/// Compression codec capability used by the block stage.
///
/// Workers never share a codec: the processor deep-copies one instance per
/// worker at construction and keeps a further instance of its own for
/// compressing fragment blocks on the front-end thread.
pub trait Compressor: Send {
    /// Returns an independent instance sharing this codec's configuration but
    /// none of its mutable state, safe to drive from another thread.
    fn deep_copy(&self) -> Box<dyn Compressor>;

    /// Compresses `input` into `scratch`.
    ///
    /// Returns the compressed length on success, which is strictly smaller
    /// than `input.len()`, or `Ok(0)` when the data does not shrink and the
    /// caller should keep the uncompressed payload. `scratch` is exactly one
    /// block long; output that does not fit counts as incompressible.
    fn compress_block(&mut self, input: &[u8], scratch: &mut [u8]) -> Result<usize>;
}
