//! Capture and symbol-file fixtures for the CLI tests
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use taskwalk::core::offsets::TaskLayout;
use taskwalk::memory::LIME_MAGIC;
use tempfile::TempDir;

pub const INIT_TASK: u64 = 0xffffffff81c15500;
pub const INIT_PADDR: u64 = 0x1500;
pub const KERNEL_SHIFT: u64 = INIT_TASK - INIT_PADDR;
pub const PGT_PADDR: u64 = 0x20000;

/// One contiguous block of physical memory starting at address 0.
pub struct PhysicalMemory {
    data: Vec<u8>,
}

impl PhysicalMemory {
    pub fn new(len: usize) -> Self {
        PhysicalMemory { data: vec![0; len] }
    }

    pub fn poke(&mut self, paddr: u64, bytes: &[u8]) {
        let start = paddr as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Write a task whose list and parent pointers are direct-map addresses of other tasks.
    pub fn task(&mut self, layout: &TaskLayout, base: u64, pid: i32, comm: &str, next: u64, parent: u64) {
        let mut name = [0u8; 16];
        name[..comm.len()].copy_from_slice(comm.as_bytes());

        self.poke(base + layout.pid as u64, &pid.to_le_bytes());
        self.poke(base + layout.comm as u64, &name);
        self.poke(
            base + layout.tasks as u64,
            &(KERNEL_SHIFT + next + layout.tasks as u64).to_le_bytes(),
        );
        self.poke(base + layout.parent as u64, &(KERNEL_SHIFT + parent).to_le_bytes());
    }

    pub fn to_lime(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LIME_MAGIC.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u64 - 1).to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&self.data);
        out
    }
}

/// A small four-process system: the idle task, systemd, kthreadd and sshd.
pub fn sample_memory(layout: &TaskLayout) -> PhysicalMemory {
    let mut mem = PhysicalMemory::new(0x40000);
    mem.task(layout, INIT_PADDR, 0, "swapper/0", 0x5000, INIT_PADDR);
    mem.task(layout, 0x5000, 1, "systemd", 0x6000, INIT_PADDR);
    mem.task(layout, 0x6000, 2, "kthreadd", 0x7000, INIT_PADDR);
    mem.task(layout, 0x7000, 731, "sshd", INIT_PADDR, 0x5000);
    mem
}

pub fn system_map() -> String {
    format!(
        "ffffffff81000000 T _text\n{:016x} D init_task\n{:016x} D init_top_pgt\n",
        INIT_TASK,
        KERNEL_SHIFT + PGT_PADDR
    )
}

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new(capture: &[u8], symbols: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("mem.lime"), capture).expect("write capture");
        fs::write(dir.path().join("System.map"), symbols).expect("write System.map");
        Fixture { dir }
    }

    pub fn sample() -> Self {
        Self::new(&sample_memory(&TaskLayout::default()).to_lime(), &system_map())
    }

    pub fn capture(&self) -> PathBuf {
        self.dir.path().join("mem.lime")
    }

    pub fn symbols(&self) -> PathBuf {
        self.dir.path().join("System.map")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("write fixture");
        path
    }
}
