use crate::block::Block;
use crate::compression::Compressor;
use crate::types::{Result, BLK_DONT_COMPRESS, BLK_IS_COMPRESSED, BLK_IS_FRAGMENT};

/// Checksums and optionally compresses one block.
///
/// Runs off-lock, inside a worker for the threaded dispatch or inline for the
/// serial one. Fragments are checksummed but never compressed here;
/// compression happens at fragment-block granularity in the assembler.
pub(crate) fn process_block(
    block: &mut Block,
    codec: &mut dyn Compressor,
    scratch: &mut [u8],
) -> Result<()> {
    if block.data.is_empty() {
        block.checksum = 0;
        return Ok(());
    }

    block.checksum = crc32fast::hash(&block.data);

    if block.flags & (BLK_IS_FRAGMENT | BLK_DONT_COMPRESS) != 0 {
        return Ok(());
    }

    let compressed = codec.compress_block(&block.data, scratch)?;
    if compressed > 0 {
        block.data.clear();
        block.data.extend_from_slice(&scratch[..compressed]);
        block.flags |= BLK_IS_COMPRESSED;
    }

    Ok(())
}
