pub mod block;
pub mod compression;
pub mod error;
pub mod fragment;
pub mod inode;
pub mod pool;
pub mod processor;
pub mod types;
pub mod writer;

pub use block::Block;
pub use compression::{Compressor, Lz4Compressor};
pub use error::SquashError;
pub use fragment::{
    FragTable, FragmentEntry, FragmentTable, Superblock, FLAG_ALWAYS_FRAGMENTS, FLAG_NO_FRAGMENTS,
    FRAGMENT_ENTRY_SIZE, FRAGMENT_UNCOMPRESSED_FLAG,
};
pub use inode::{BlockRecord, FileInode, InodeId, NO_FRAGMENT};
pub use pool::{BlockPool, PoolMetricsSnapshot};
pub use processor::{BlockProcessor, ProcessorConfig, DEFAULT_BLOCK_SIZE};
pub use types::{
    ProcessorStats, Result, BLK_ALIGN, BLK_DONT_COMPRESS, BLK_DONT_FRAGMENT, BLK_FIRST_BLOCK,
    BLK_IS_COMPRESSED, BLK_IS_FRAGMENT, BLK_IS_SPARSE, BLK_LAST_BLOCK, BLK_USER_SETTABLE,
};
pub use writer::{BlockWriter, FileBlockWriter};
