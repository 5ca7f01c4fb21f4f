mod assembler;
mod dispatch;
mod stage;

use crate::block::Block;
use crate::compression::Compressor;
use crate::error::SquashError;
use crate::fragment::{FragmentTable, Superblock, FLAG_ALWAYS_FRAGMENTS, FLAG_NO_FRAGMENTS};
use crate::inode::{FileInode, InodeId};
use crate::pool::BlockPool;
use crate::types::{
    ProcessorStats, Result, BLK_DONT_FRAGMENT, BLK_FIRST_BLOCK, BLK_IS_FRAGMENT, BLK_IS_SPARSE,
    BLK_LAST_BLOCK, BLK_USER_SETTABLE,
};
use crate::writer::BlockWriter;

use assembler::Assembler;
use dispatch::{Dispatch, SerialDispatch, ThreadedDispatch};

/// Default maximum data block size (128 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024;

/// Tuning knobs for [`BlockProcessor::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Maximum payload size of a data block.
    pub block_size: usize,
    /// Worker threads running the compression stage. `0` and `1` both select
    /// the synchronous inline pipeline.
    pub num_workers: usize,
    /// Maximum number of blocks admitted and not yet completed. The sole
    /// bound on pipeline memory.
    pub max_backlog: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            num_workers: 1,
            max_backlog: 16,
        }
    }
}

/// Streaming front end over the block pipeline.
///
/// Feed files through `begin_file` / `append` / `end_file`, then call
/// [`finish`](Self::finish) to drain the pipeline and flush the open
/// fragment block. Inodes are allocated per file and updated as blocks
/// land; their contents are stable once `finish` has returned.
///
/// The back-end assembler runs on the calling thread: every call that files
/// work also drains whatever completed blocks are ready, so writer output
/// advances steadily instead of piling up behind `finish`.
pub struct BlockProcessor<W: BlockWriter, T: FragmentTable> {
    block_size: usize,
    dispatch: Box<dyn Dispatch>,
    assembler: Assembler,
    pool: BlockPool,
    writer: W,
    frag_table: T,
    inodes: Vec<FileInode>,
    stats: ProcessorStats,
    latched: Option<SquashError>,

    current_inode: Option<InodeId>,
    blk_flags: u32,
    blk_index: u32,
    blk_current: Option<Block>,
}

impl<W: BlockWriter, T: FragmentTable> BlockProcessor<W, T> {
    /// Builds a processor around the injected codec, writer and fragment
    /// table, spawning worker threads when `config.num_workers > 1`.
    pub fn new(
        config: ProcessorConfig,
        compressor: Box<dyn Compressor>,
        writer: W,
        frag_table: T,
    ) -> Result<Self> {
        if config.block_size == 0 {
            return Err(SquashError::Sequence("block size must be non-zero"));
        }

        let dispatch: Box<dyn Dispatch> = if config.num_workers > 1 {
            Box::new(ThreadedDispatch::new(
                config.num_workers,
                config.max_backlog,
                config.block_size,
                compressor.as_ref(),
            )?)
        } else {
            Box::new(SerialDispatch::new(
                compressor.deep_copy(),
                config.block_size,
            ))
        };

        Ok(Self {
            block_size: config.block_size,
            dispatch,
            assembler: Assembler::new(config.block_size, compressor),
            pool: BlockPool::new(config.block_size, config.max_backlog.max(1)),
            writer,
            frag_table,
            inodes: Vec::new(),
            stats: ProcessorStats::default(),
            latched: None,
            current_inode: None,
            blk_flags: 0,
            blk_index: 0,
            blk_current: None,
        })
    }

    /// Starts a new file and returns the id of its inode.
    ///
    /// `flags` may only contain user-settable bits (`BLK_DONT_COMPRESS`,
    /// `BLK_ALIGN`, `BLK_DONT_FRAGMENT`). Fails with a sequence error while
    /// another file is open.
    pub fn begin_file(&mut self, flags: u32) -> Result<InodeId> {
        self.check_status()?;

        if self.current_inode.is_some() {
            return Err(SquashError::Sequence("begin_file while a file is open"));
        }
        if flags & !BLK_USER_SETTABLE != 0 {
            return Err(SquashError::Unsupported(flags));
        }

        let id = InodeId(self.inodes.len());
        self.inodes.push(FileInode::new());
        self.current_inode = Some(id);
        self.blk_flags = flags | BLK_FIRST_BLOCK;
        self.blk_index = 0;
        Ok(id)
    }

    /// Appends bytes to the current file.
    pub fn append(&mut self, mut data: &[u8]) -> Result<()> {
        self.check_status()?;

        let Some(inode_id) = self.current_inode else {
            return Err(SquashError::Sequence("append without an open file"));
        };

        let inode = &mut self.inodes[inode_id.0];
        inode.set_file_size(inode.file_size() + data.len() as u64);

        while !data.is_empty() {
            let block = self.blk_current.get_or_insert_with(|| {
                let mut fresh = self.pool.acquire();
                fresh.flags = self.blk_flags;
                fresh.inode = inode_id;
                fresh
            });

            let room = self.block_size - block.size();
            if room == 0 {
                // Drain between flushes so a single long append cannot pile
                // up completions behind the splitter.
                self.flush_current()?;
                self.drain_completed()?;
                continue;
            }

            let take = room.min(data.len());
            block.data.extend_from_slice(&data[..take]);
            data = &data[take..];
            self.stats.input_bytes_read += take as u64;
        }

        if self
            .blk_current
            .as_ref()
            .is_some_and(|block| block.size() == self.block_size)
        {
            self.flush_current()?;
        }

        self.drain_completed()
    }

    /// Closes the current file, flushing its tail end into the pipeline.
    ///
    /// Data blocks may still be in flight afterwards; only
    /// [`finish`](Self::finish) guarantees the inode is complete.
    pub fn end_file(&mut self) -> Result<()> {
        self.check_status()?;

        let Some(inode_id) = self.current_inode else {
            return Err(SquashError::Sequence("end_file without an open file"));
        };

        // Once a non-fragment block has been emitted the assembler needs an
        // explicit end-of-file marker: either the trailing data block itself
        // (tail kept whole under DONT_FRAGMENT) or a zero-size sentinel,
        // enqueued ahead of a trailing fragment.
        if self.blk_flags & BLK_FIRST_BLOCK == 0 {
            if self.blk_current.is_some() && self.blk_flags & BLK_DONT_FRAGMENT != 0 {
                if let Some(block) = &mut self.blk_current {
                    block.flags |= BLK_LAST_BLOCK;
                }
            } else {
                let mut sentinel = self.pool.acquire();
                sentinel.inode = inode_id;
                sentinel.flags = self.blk_flags | BLK_LAST_BLOCK;
                self.dispatch.submit(sentinel)?;
            }
        }

        if self.blk_current.is_some() {
            self.flush_current()?;
        }

        self.current_inode = None;
        self.blk_flags = 0;
        self.drain_completed()
    }

    /// Waits for all in-flight blocks, drains them in order and finalizes a
    /// partially filled fragment block. Returns the latched pipeline error,
    /// if any.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }

        let flush_status = self.dispatch.flush();
        self.drain_completed()?;
        flush_status?;

        let finalized = self.assembler.finalize_fragment_block(
            &mut self.writer,
            &mut self.frag_table,
            &mut self.stats,
        );
        if let Err(err) = &finalized {
            self.latched = Some(err.clone());
        }
        finalized
    }

    /// Runtime statistics. Only meaningful while the processor is quiescent.
    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// The inode allocated by `begin_file`.
    pub fn inode(&self, id: InodeId) -> &FileInode {
        &self.inodes[id.0]
    }

    /// Writes the fragment table and records its location in the super
    /// block, or marks the archive fragment-free.
    pub fn write_fragment_table(&mut self, superblock: &mut Superblock) -> Result<()> {
        self.check_status()?;

        if self.frag_table.entry_count() == 0 {
            superblock.fragment_entry_count = 0;
            superblock.fragment_table_start = u64::MAX;
            superblock.flags &= !FLAG_ALWAYS_FRAGMENTS;
            superblock.flags |= FLAG_NO_FRAGMENTS;
            return Ok(());
        }

        let (start, _len) = self.frag_table.serialize(&mut self.writer)?;
        superblock.flags &= !FLAG_NO_FRAGMENTS;
        superblock.flags |= FLAG_ALWAYS_FRAGMENTS;
        superblock.fragment_entry_count = self.frag_table.entry_count();
        superblock.fragment_table_start = start;
        Ok(())
    }

    /// Tears the processor down and hands back the writer and fragment
    /// table. Worker threads are joined by the dispatch drop.
    pub fn into_inner(self) -> (W, T) {
        (self.writer, self.frag_table)
    }

    fn check_status(&self) -> Result<()> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        self.dispatch.status()
    }

    /// Stamps fragment/sparse classification and the in-file index on the
    /// current block, then admits it.
    fn flush_current(&mut self) -> Result<()> {
        let Some(mut block) = self.blk_current.take() else {
            return Ok(());
        };

        if block.size() < self.block_size && block.flags & BLK_DONT_FRAGMENT == 0 {
            block.flags |= BLK_IS_FRAGMENT;
        } else {
            self.blk_flags &= !BLK_FIRST_BLOCK;
            if !block.data.is_empty() && block.data.iter().all(|&byte| byte == 0) {
                block.flags |= BLK_IS_SPARSE;
                block.data.clear();
            }
        }

        block.index = self.blk_index;
        self.blk_index += 1;
        self.dispatch.submit(block)
    }

    /// Runs the assembler over every completion that is ready, in order.
    fn drain_completed(&mut self) -> Result<()> {
        while let Some(done) = self.dispatch.pop_ready() {
            if let Err(err) = done.status {
                self.pool.recycle(done.block);
                self.latched = Some(err.clone());
                return Err(err);
            }

            let processed = self.assembler.process_completed(
                done.block,
                &mut self.inodes,
                &mut self.writer,
                &mut self.frag_table,
                &mut self.stats,
                &self.pool,
            );
            if let Err(err) = processed {
                self.latched = Some(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }
}
