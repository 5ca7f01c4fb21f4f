use crate::inode::InodeId;

/// A unit of file data moving through the pipeline.
///
/// The buffer is allocated once at the processor's block size and reused via
/// the [`BlockPool`](crate::BlockPool); `data.len()` is the used size. The
/// inode back-reference is an arena index, so a block never owns file
/// metadata and workers never touch it.
#[derive(Debug)]
pub struct Block {
    /// Payload bytes. Uncompressed until the block stage replaces them.
    pub data: Vec<u8>,
    /// Combination of the `BLK_*` bits.
    pub flags: u32,
    /// CRC32 of the uncompressed payload, 0 if empty.
    pub checksum: u32,
    /// Arena index of the file's inode.
    pub inode: InodeId,
    /// 0-based position of this block within its file.
    pub index: u32,
    /// Global admission counter; the sole ordering key for reassembly.
    pub sequence: u64,
}

impl Block {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            flags: 0,
            checksum: 0,
            inode: InodeId::default(),
            index: 0,
            sequence: 0,
        }
    }

    /// Used payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Clears payload and bookkeeping so the block can be reissued.
    pub(crate) fn reset(&mut self) {
        self.data.clear();
        self.flags = 0;
        self.checksum = 0;
        self.inode = InodeId::default();
        self.index = 0;
        self.sequence = 0;
    }
}
