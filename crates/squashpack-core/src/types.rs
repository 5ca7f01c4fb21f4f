use serde::{Deserialize, Serialize};

use crate::error::SquashError;

pub type Result<T> = std::result::Result<T, SquashError>;

/// Do not compress this file's blocks or tail end.
pub const BLK_DONT_COMPRESS: u32 = 1 << 0;
/// Pad the output to the device block size before the first and after the
/// last block of the file.
pub const BLK_ALIGN: u32 = 1 << 1;
/// Store the tail end as a regular data block instead of a fragment.
pub const BLK_DONT_FRAGMENT: u32 = 1 << 2;

/// Flag bits accepted by `begin_file`. Everything else is internal.
pub const BLK_USER_SETTABLE: u32 = BLK_DONT_COMPRESS | BLK_ALIGN | BLK_DONT_FRAGMENT;

/// First block of a file. Cleared from the ongoing flags once a
/// non-fragment block has been emitted.
pub const BLK_FIRST_BLOCK: u32 = 1 << 8;
/// Last block of a file, carried by a data block or by a sentinel.
pub const BLK_LAST_BLOCK: u32 = 1 << 9;
/// Tail end destined for a fragment block; never compressed by a worker.
pub const BLK_IS_FRAGMENT: u32 = 1 << 10;
/// The payload was replaced with its compressed form.
pub const BLK_IS_COMPRESSED: u32 = 1 << 11;
/// All-zero block stored as a hole; never reaches the block writer.
pub const BLK_IS_SPARSE: u32 = 1 << 12;

/// Monotonic runtime counters maintained by the back-end assembler.
///
/// The snapshot is only meaningful while the processor is quiescent, i.e.
/// between front-end calls or after `finish`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    /// Total number of bytes fed into the front-end API.
    pub input_bytes_read: u64,
    /// Data blocks handed to the block writer (deduplicated ones excluded).
    pub data_block_count: u64,
    /// Fragment blocks written out.
    pub frag_block_count: u64,
    /// All-zero blocks recorded as holes.
    pub sparse_block_count: u64,
    /// Tail-end fragments produced, including ones later deduplicated.
    pub total_frag_count: u64,
    /// Tail-end fragments actually stored in fragment blocks.
    pub actual_frag_count: u64,
}
