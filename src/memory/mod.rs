//! Memory module for handling LiME format memory dumps
use crate::error::{AnalysisError, Result};
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// bytes [0x45, 0x4D, 0x69, 0x4C] = "EMiL" read as a little-endian u32
pub const LIME_MAGIC: u32 = 0x4C694D45;

/// Size of a packed capture block header.
pub const HEADER_SIZE: u64 = 32;

/// One capture block header as stored in the dump.
/// Layout (32 bytes, packed, little-endian):
/// - Magic: 4 bytes
/// - Version: 4 bytes
/// - Start: 8 bytes - first physical address of the block
/// - End: 8 bytes - last physical address of the block (inclusive)
/// - Reserved: 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    pub magic: u32,
    pub version: u32,
    pub start_addr: u64,
    pub end_addr: u64,
    pub reserved: [u8; 8],
}

impl CaptureHeader {
    /// Decode a header from its raw on-disk bytes.
    pub fn from_bytes(raw: &[u8; HEADER_SIZE as usize]) -> Self {
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&raw[24..32]);
        CaptureHeader {
            magic: le_u32(&raw[0..4]),
            version: le_u32(&raw[4..8]),
            start_addr: le_u64(&raw[8..16]),
            end_addr: le_u64(&raw[16..24]),
            reserved,
        }
    }

    /// Number of bytes of physical memory following this header.
    pub fn data_len(&self) -> Option<u64> {
        self.end_addr
            .checked_sub(self.start_addr)
            .and_then(|span| span.checked_add(1))
    }
}

/// One entry of the block index: where a run of physical memory lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureBlock {
    pub phys_start: u64,
    pub phys_end: u64,
    pub file_data_start: u64,
    pub file_data_end: u64,
}

impl CaptureBlock {
    /// Check if a physical address is within this block's `[phys_start, phys_end)` window
    pub fn contains(&self, paddr: u64) -> bool {
        paddr >= self.phys_start && paddr < self.phys_end
    }

    /// Check that every byte of `[paddr, paddr + len)` is inside this block.
    pub fn contains_range(&self, paddr: u64, len: usize) -> bool {
        if len == 0 {
            return self.contains(paddr);
        }
        match paddr.checked_add(len as u64 - 1) {
            Some(last) => self.contains(paddr) && self.contains(last),
            None => false,
        }
    }

    /// Convert a physical address inside this block to its file offset
    pub fn file_offset_of(&self, paddr: u64) -> u64 {
        self.file_data_start + (paddr - self.phys_start)
    }
}

/// Result of a successful physical lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    pub block: usize,
    pub file_offset: u64,
}

/// How a physical byte range relates to the captured blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysRange {
    Contained { file_offset: u64 },
    Unmapped,
    Straddles { block: usize },
}

/// Append-ordered index of every capture block in a dump.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    blocks: Vec<CaptureBlock>,
}

impl BlockIndex {
    /// Parse every capture header in `source`, starting at file offset 0.
    ///
    /// Each header is followed by `end - start + 1` bytes of memory and then the
    /// next header. Parsing stops once the consumed byte count reaches
    /// `file length - 1`. A short header, a bad magic, an inverted range or a
    /// block running past the end of the file is fatal.
    pub fn build<R: Read + Seek>(source: &mut R) -> Result<Self> {
        let file_len = source.seek(SeekFrom::End(0))?;
        if file_len == 0 {
            return Err(corrupt(0, "empty capture file"));
        }
        source.seek(SeekFrom::Start(0))?;

        let mut blocks = Vec::new();
        let mut consumed = 0u64;

        while consumed < file_len - 1 {
            let mut raw = [0u8; HEADER_SIZE as usize];
            source.seek(SeekFrom::Start(consumed))?;
            if let Err(e) = source.read_exact(&mut raw) {
                return Err(match e.kind() {
                    ErrorKind::UnexpectedEof => corrupt(
                        consumed,
                        format!("truncated header for block {}", blocks.len()),
                    ),
                    _ => AnalysisError::IoError(e),
                });
            }

            let header = CaptureHeader::from_bytes(&raw);
            if header.magic != LIME_MAGIC {
                return Err(corrupt(
                    consumed,
                    format!("bad magic 0x{:08x} in block {}", header.magic, blocks.len()),
                ));
            }

            let data_len = header.data_len().ok_or_else(|| {
                corrupt(
                    consumed,
                    format!(
                        "inconsistent range 0x{:x}-0x{:x}",
                        header.start_addr, header.end_addr
                    ),
                )
            })?;

            let file_data_start = consumed + HEADER_SIZE;
            let file_data_end = file_data_start
                .checked_add(data_len)
                .filter(|end| *end <= file_len)
                .ok_or_else(|| {
                    corrupt(
                        consumed,
                        format!(
                            "block {} data (0x{:x} bytes) runs past end of file",
                            blocks.len(),
                            data_len
                        ),
                    )
                })?;

            debug!(
                "Block {}: phys 0x{:x}-0x{:x}, file 0x{:x}-0x{:x} (version {})",
                blocks.len(),
                header.start_addr,
                header.end_addr,
                file_data_start,
                file_data_end,
                header.version
            );

            blocks.push(CaptureBlock {
                phys_start: header.start_addr,
                phys_end: header.end_addr,
                file_data_start,
                file_data_end,
            });
            consumed = file_data_end;
        }

        if blocks.is_empty() {
            return Err(corrupt(0, "no capture blocks"));
        }

        Ok(BlockIndex { blocks })
    }

    /// Find the block and file offset holding a physical address.
    pub fn lookup(&self, paddr: u64) -> Option<BlockLocation> {
        self.blocks
            .iter()
            .enumerate()
            .find(|(_, block)| block.contains(paddr))
            .map(|(i, block)| BlockLocation {
                block: i,
                file_offset: block.file_offset_of(paddr),
            })
    }

    /// Map a file offset inside some block's data region back to its physical address.
    pub fn inverse_lookup(&self, file_offset: u64) -> Option<u64> {
        self.blocks
            .iter()
            .find(|block| file_offset >= block.file_data_start && file_offset < block.file_data_end)
            .map(|block| file_offset - block.file_data_start + block.phys_start)
    }

    /// Classify `[paddr, paddr + len)` against the block that holds `paddr`.
    pub fn resolve_range(&self, paddr: u64, len: usize) -> PhysRange {
        match self.lookup(paddr) {
            None => PhysRange::Unmapped,
            Some(loc) if self.blocks[loc.block].contains_range(paddr, len) => PhysRange::Contained {
                file_offset: loc.file_offset,
            },
            Some(loc) => PhysRange::Straddles { block: loc.block },
        }
    }

    /// Highest physical address seen across all blocks
    pub fn pa_max(&self) -> u64 {
        self.blocks.iter().map(|b| b.phys_end).max().unwrap_or(0)
    }

    pub fn block(&self, index: usize) -> Option<&CaptureBlock> {
        self.blocks.get(index)
    }

    pub fn blocks(&self) -> &[CaptureBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// A capture file together with its block index.
///
/// All reads are explicit seek-then-read on the one source; no method relies
/// on the stream position left behind by a previous call.
pub struct MemoryDump<R> {
    source: R,
    index: BlockIndex,
}

impl MemoryDump<Cursor<Mmap>> {
    /// Memory-map a capture file and index its blocks
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mapped = unsafe { Mmap::map(&file)? };
        Self::from_reader(Cursor::new(mapped))
    }
}

impl<R: Read + Seek> MemoryDump<R> {
    /// Index the blocks of an arbitrary seekable source
    pub fn from_reader(mut source: R) -> Result<Self> {
        let index = BlockIndex::build(&mut source)?;
        Ok(MemoryDump { source, index })
    }

    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    pub fn pa_max(&self) -> u64 {
        self.index.pa_max()
    }

    /// Read `buf.len()` bytes at an absolute file offset.
    pub fn read_at(&mut self, file_offset: u64, buf: &mut [u8]) -> Result<()> {
        self.source.seek(SeekFrom::Start(file_offset))?;
        self.source.read_exact(buf)?;
        Ok(())
    }

    /// Read a little-endian u64 at an absolute file offset
    pub fn read_u64_at(&mut self, file_offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_at(file_offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Physical address of the current stream position, if it sits inside a block.
    pub fn position_paddr(&mut self) -> Result<Option<u64>> {
        let position = self.source.stream_position()?;
        Ok(self.index.inverse_lookup(position))
    }
}

fn corrupt(offset: u64, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::CorruptCapture {
        offset,
        reason: reason.into(),
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
