use std::collections::HashMap;

use crate::block::Block;
use crate::compression::Compressor;
use crate::fragment::{FragmentEntry, FragmentTable};
use crate::inode::{BlockRecord, FileInode};
use crate::pool::BlockPool;
use crate::types::{ProcessorStats, Result, BLK_IS_COMPRESSED, BLK_IS_FRAGMENT, BLK_IS_SPARSE};
use crate::writer::BlockWriter;

/// A fragment packed into the open fragment block, waiting for the block to
/// be finalized before its table entry can carry an absolute offset.
#[derive(Debug, Clone, Copy)]
struct PendingFragment {
    local_offset: u32,
    size: u32,
}

/// A unique fragment already placed, kept for dedup confirmation.
///
/// The uncompressed payload is retained so a dedup hit can always be
/// confirmed byte for byte, even after the containing fragment block was
/// compressed and written out.
#[derive(Debug)]
struct KnownFragment {
    entry_index: u32,
    local_offset: u32,
    payload: Vec<u8>,
}

/// Back-end of the pipeline, running on the front-end thread.
///
/// Consumes completed blocks strictly in sequence order, deduplicates whole
/// blocks against the writer, packs tail ends into fragment blocks, updates
/// inodes and maintains the statistics counters.
pub(crate) struct Assembler {
    block_size: usize,
    codec: Box<dyn Compressor>,
    scratch: Vec<u8>,
    frag_buffer: Vec<u8>,
    pending: Vec<PendingFragment>,
    frag_index: HashMap<(u32, u32), Vec<KnownFragment>>,
}

impl Assembler {
    pub(crate) fn new(block_size: usize, codec: Box<dyn Compressor>) -> Self {
        Self {
            block_size,
            codec,
            scratch: vec![0u8; block_size],
            frag_buffer: Vec::with_capacity(block_size),
            pending: Vec::new(),
            frag_index: HashMap::new(),
        }
    }

    /// Handles one completed block popped in sequence order.
    pub(crate) fn process_completed(
        &mut self,
        block: Block,
        inodes: &mut [FileInode],
        writer: &mut dyn BlockWriter,
        table: &mut dyn FragmentTable,
        stats: &mut ProcessorStats,
        pool: &BlockPool,
    ) -> Result<()> {
        let result = if block.flags & BLK_IS_FRAGMENT != 0 {
            self.process_fragment(&block, inodes, writer, table, stats)
        } else if block.flags & BLK_IS_SPARSE != 0 {
            let inode = &mut inodes[block.inode.0];
            inode.add_block_record(block.index, BlockRecord { offset: 0, size: 0 });
            stats.sparse_block_count += 1;
            Ok(())
        } else if block.data.is_empty() {
            // End-of-file sentinel; carries no payload and no inode record.
            Ok(())
        } else {
            self.process_data_block(&block, inodes, writer, stats)
        };

        pool.recycle(block);
        result
    }

    fn process_data_block(
        &mut self,
        block: &Block,
        inodes: &mut [FileInode],
        writer: &mut dyn BlockWriter,
        stats: &mut ProcessorStats,
    ) -> Result<()> {
        let size = block.size() as u32;
        let compressed = block.flags & BLK_IS_COMPRESSED != 0;
        let inode = &mut inodes[block.inode.0];

        if let Some((offset, written)) =
            writer.lookup_dedup(block.checksum, size, compressed, &block.data)?
        {
            inode.add_block_record(
                block.index,
                BlockRecord {
                    offset,
                    size: written,
                },
            );
            return Ok(());
        }

        let (offset, written) = writer.write(&block.data, block.checksum, block.flags)?;
        inode.add_block_record(
            block.index,
            BlockRecord {
                offset,
                size: written,
            },
        );
        stats.data_block_count += 1;
        Ok(())
    }

    fn process_fragment(
        &mut self,
        block: &Block,
        inodes: &mut [FileInode],
        writer: &mut dyn BlockWriter,
        table: &mut dyn FragmentTable,
        stats: &mut ProcessorStats,
    ) -> Result<()> {
        let size = block.size() as u32;

        if let Some(known) = self.lookup_fragment(block.checksum, size, &block.data) {
            let inode = &mut inodes[block.inode.0];
            inode.set_frag_location(known.0, known.1);
            stats.total_frag_count += 1;
            return Ok(());
        }

        if self.frag_buffer.len() + block.size() > self.block_size {
            self.finalize_fragment_block(writer, table, stats)?;
        }

        let local_offset = self.frag_buffer.len() as u32;
        // Entry indices are append-order predictable: everything already in
        // the table plus everything waiting in the open block.
        let entry_index = table.entry_count() + self.pending.len() as u32;

        self.frag_buffer.extend_from_slice(&block.data);
        self.pending.push(PendingFragment { local_offset, size });
        self.frag_index
            .entry((block.checksum, size))
            .or_default()
            .push(KnownFragment {
                entry_index,
                local_offset,
                payload: block.data.clone(),
            });

        let inode = &mut inodes[block.inode.0];
        inode.set_frag_location(entry_index, local_offset);
        stats.total_frag_count += 1;
        stats.actual_frag_count += 1;
        Ok(())
    }

    fn lookup_fragment(&self, checksum: u32, size: u32, payload: &[u8]) -> Option<(u32, u32)> {
        let known = self.frag_index.get(&(checksum, size))?;
        known
            .iter()
            .find(|frag| frag.payload == payload)
            .map(|frag| (frag.entry_index, frag.local_offset))
    }

    /// Compresses and writes the open fragment block, then files one table
    /// entry per contained fragment.
    pub(crate) fn finalize_fragment_block(
        &mut self,
        writer: &mut dyn BlockWriter,
        table: &mut dyn FragmentTable,
        stats: &mut ProcessorStats,
    ) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let checksum = crc32fast::hash(&self.frag_buffer);
        let compressed_size = self
            .codec
            .compress_block(&self.frag_buffer, &mut self.scratch)?;

        let (payload, flags) = if compressed_size > 0 {
            (&self.scratch[..compressed_size], BLK_IS_COMPRESSED)
        } else {
            (&self.frag_buffer[..], 0)
        };

        let (offset, written) = writer.write(payload, checksum, flags)?;
        tracing::debug!(
            offset,
            written,
            fragments = self.pending.len(),
            compressed = compressed_size > 0,
            "finalized fragment block"
        );

        for fragment in self.pending.drain(..) {
            table.append_entry(FragmentEntry {
                start: offset + fragment.local_offset as u64,
                size: fragment.size,
                compressed: compressed_size > 0,
            })?;
        }

        stats.frag_block_count += 1;
        self.frag_buffer.clear();
        Ok(())
    }
}
