use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::types::{Result, BLK_ALIGN, BLK_FIRST_BLOCK, BLK_IS_COMPRESSED, BLK_LAST_BLOCK};

/// Destination for finished blocks.
///
/// The assembler hands every surviving data block and every finalized
/// fragment block to a writer and records the returned location in the
/// owning inode. `checksum` is always the CRC32 of the *uncompressed*
/// payload; the writer keeps it so its dedup index can answer later
/// [`lookup_dedup`](BlockWriter::lookup_dedup) queries.
pub trait BlockWriter {
    /// Appends `data` to the output and returns `(offset, on-disk size)`.
    ///
    /// Implementations may pad the output to the device block size when
    /// `flags` carries `BLK_ALIGN` together with `BLK_FIRST_BLOCK` (pad
    /// before) or `BLK_LAST_BLOCK` (pad after).
    fn write(&mut self, data: &[u8], checksum: u32, flags: u32) -> Result<(u64, u32)>;

    /// Looks for an identical block written earlier.
    ///
    /// `checksum` and `size` narrow the candidates; identity must be
    /// confirmed against `payload` so CRC collisions never alias blocks.
    fn lookup_dedup(
        &mut self,
        checksum: u32,
        size: u32,
        compressed: bool,
        payload: &[u8],
    ) -> Result<Option<(u64, u32)>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey {
    checksum: u32,
    size: u32,
    compressed: bool,
}

#[derive(Debug, Clone, Copy)]
struct DedupSlot {
    offset: u64,
    written: u32,
}

/// Disk-backed block writer with whole-block deduplication.
///
/// Appends blocks at the current end of `file` and remembers
/// `(checksum, size, compressed)` for every written block. Dedup candidates
/// are confirmed by re-reading the stored bytes and comparing them with the
/// probe payload.
#[derive(Debug)]
pub struct FileBlockWriter<F: Read + Write + Seek> {
    file: F,
    offset: u64,
    devblksz: u64,
    index: HashMap<DedupKey, Vec<DedupSlot>>,
}

impl<F: Read + Write + Seek> FileBlockWriter<F> {
    /// Wraps `file`, padding aligned blocks to `devblksz` bytes.
    /// `devblksz == 0` disables alignment.
    pub fn new(mut file: F, devblksz: u64) -> Result<Self> {
        let offset = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            offset,
            devblksz,
            index: HashMap::new(),
        })
    }

    /// Current append position.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Consumes the writer and returns the underlying file.
    pub fn into_inner(self) -> F {
        self.file
    }

    fn pad_to_device_block(&mut self) -> Result<()> {
        if self.devblksz == 0 {
            return Ok(());
        }
        let rem = self.offset % self.devblksz;
        if rem == 0 {
            return Ok(());
        }
        let padding = (self.devblksz - rem) as usize;
        self.file.write_all(&vec![0u8; padding])?;
        self.offset += padding as u64;
        Ok(())
    }
}

impl<F: Read + Write + Seek> BlockWriter for FileBlockWriter<F> {
    fn write(&mut self, data: &[u8], checksum: u32, flags: u32) -> Result<(u64, u32)> {
        if flags & BLK_ALIGN != 0 && flags & BLK_FIRST_BLOCK != 0 {
            self.pad_to_device_block()?;
        }

        let start = self.offset;
        self.file.write_all(data)?;
        self.offset += data.len() as u64;

        if flags & BLK_ALIGN != 0 && flags & BLK_LAST_BLOCK != 0 {
            self.pad_to_device_block()?;
        }

        let written = data.len() as u32;
        let key = DedupKey {
            checksum,
            size: written,
            compressed: flags & BLK_IS_COMPRESSED != 0,
        };
        self.index.entry(key).or_default().push(DedupSlot {
            offset: start,
            written,
        });

        Ok((start, written))
    }

    fn lookup_dedup(
        &mut self,
        checksum: u32,
        size: u32,
        compressed: bool,
        payload: &[u8],
    ) -> Result<Option<(u64, u32)>> {
        let key = DedupKey {
            checksum,
            size,
            compressed,
        };
        let Some(slots) = self.index.get(&key) else {
            return Ok(None);
        };
        let slots = slots.clone();

        let mut stored = vec![0u8; size as usize];
        for slot in slots {
            self.file.seek(SeekFrom::Start(slot.offset))?;
            self.file.read_exact(&mut stored)?;
            if stored == payload {
                self.file.seek(SeekFrom::Start(self.offset))?;
                return Ok(Some((slot.offset, slot.written)));
            }
        }

        self.file.seek(SeekFrom::Start(self.offset))?;
        Ok(None)
    }
}
