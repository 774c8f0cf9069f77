//! Synthetic LiME captures for unit tests
use crate::core::offsets::TaskLayout;
use crate::memory::LIME_MAGIC;
use crate::translation::VirtualAddressParts;
use std::io::Cursor;

const PRESENT_RW: u64 = 0x63;
const NX: u64 = 1 << 63;

/// Fields written into one synthetic task_struct.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pid: i32,
    comm: String,
    next: u64,
    prev: u64,
    parent: u64,
    ppid: Option<i32>,
}

impl TaskSpec {
    pub fn new(pid: i32, comm: &str) -> Self {
        TaskSpec {
            pid,
            comm: comm.to_string(),
            ..Default::default()
        }
    }

    pub fn next(mut self, vaddr: u64) -> Self {
        self.next = vaddr;
        self
    }

    pub fn prev(mut self, vaddr: u64) -> Self {
        self.prev = vaddr;
        self
    }

    pub fn parent(mut self, vaddr: u64) -> Self {
        self.parent = vaddr;
        self
    }

    pub fn ppid(mut self, ppid: i32) -> Self {
        self.ppid = Some(ppid);
        self
    }
}

/// Builds a capture file block by block, then pokes values at physical addresses.
#[derive(Debug, Default)]
pub struct CaptureBuilder {
    blocks: Vec<(u64, Vec<u8>)>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a zero-filled block covering `len` bytes from `start`.
    pub fn block(mut self, start: u64, len: usize) -> Self {
        self.blocks.push((start, vec![0u8; len]));
        self
    }

    /// Write bytes at a physical address; the bytes may span adjacent blocks.
    pub fn write_bytes(mut self, paddr: u64, bytes: &[u8]) -> Self {
        for (i, byte) in bytes.iter().enumerate() {
            let addr = paddr + i as u64;
            let (start, data) = self
                .blocks
                .iter_mut()
                .find(|(start, data)| addr >= *start && addr < *start + data.len() as u64)
                .unwrap_or_else(|| panic!("0x{:x} is not inside any block", addr));
            data[(addr - *start) as usize] = *byte;
        }
        self
    }

    pub fn write_u64(self, paddr: u64, value: u64) -> Self {
        self.write_bytes(paddr, &value.to_le_bytes())
    }

    pub fn write_i32(self, paddr: u64, value: i32) -> Self {
        self.write_bytes(paddr, &value.to_le_bytes())
    }

    /// Lay down a task_struct at `base` using `layout`'s offsets.
    pub fn task(self, layout: &TaskLayout, base: u64, spec: &TaskSpec) -> Self {
        let mut comm = [0u8; 16];
        let len = spec.comm.len().min(comm.len());
        comm[..len].copy_from_slice(&spec.comm.as_bytes()[..len]);

        let builder = self
            .write_i32(base + layout.pid as u64, spec.pid)
            .write_bytes(base + layout.comm as u64, &comm)
            .write_u64(base + layout.tasks as u64, spec.next)
            .write_u64(base + layout.tasks as u64 + 8, spec.prev)
            .write_u64(base + layout.parent as u64, spec.parent);

        match (layout.ppid, spec.ppid) {
            (Some(offset), Some(ppid)) => builder.write_i32(base + offset as u64, ppid),
            _ => builder,
        }
    }

    /// Install a 4-level mapping of the page holding `vaddr` onto `page`.
    pub fn map_page(self, pml4: u64, tables: [u64; 3], vaddr: u64, page: u64) -> Self {
        let parts = VirtualAddressParts::split(vaddr);
        let [pdpt, pd, pt] = tables;
        self.write_u64(pml4 + 8 * parts.pml4, pdpt | PRESENT_RW)
            .write_u64(pdpt + 8 * parts.pdpt, pd | PRESENT_RW)
            .write_u64(pd + 8 * parts.pd, pt | PRESENT_RW)
            .write_u64(pt + 8 * parts.pt, page | PRESENT_RW | NX)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::new();
        for (start, data) in self.blocks {
            out.extend_from_slice(&LIME_MAGIC.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&start.to_le_bytes());
            out.extend_from_slice(&(start + data.len() as u64 - 1).to_le_bytes());
            out.extend_from_slice(&[0u8; 8]);
            out.extend_from_slice(&data);
        }
        out
    }

    pub fn build(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.into_bytes())
    }
}
