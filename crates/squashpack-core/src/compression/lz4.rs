use lz4_flex::block::compress_into;

use crate::types::Result;

use super::Compressor;

/// LZ4 block codec.
///
/// Stateless, so a deep copy is a plain clone. Compressed output is the raw
/// LZ4 block format without a size prefix; the surrounding layout records the
/// uncompressed size, so none is needed in-band.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl Lz4Compressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compressor for Lz4Compressor {
    fn deep_copy(&self) -> Box<dyn Compressor> {
        Box::new(*self)
    }

    fn compress_block(&mut self, input: &[u8], scratch: &mut [u8]) -> Result<usize> {
        match compress_into(input, scratch) {
            Ok(n) if n > 0 && n < input.len() => Ok(n),
            // No gain, or the encoded form did not fit in one block: the
            // caller stores the uncompressed payload.
            Ok(_) | Err(_) => Ok(0),
        }
    }
}
