//! Fixed-offset field reads from a process descriptor (task_struct)
use crate::core::offsets::TaskLayout;
use crate::error::{AnalysisError, Result};
use crate::memory::MemoryDump;
use std::fmt;
use std::io::{Read, Seek};

pub const TASK_COMM_LEN: usize = 16;

/// comm of the boot CPU's idle task
pub const IDLE_TASK_COMM: &[u8] = b"swapper/0";

/// The descriptor fields this tool reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    Pid,
    Ppid,
    Comm,
    TasksNext,
    TasksPrev,
    Parent,
}

impl TaskField {
    /// Number of bytes the field occupies
    pub fn size(self) -> usize {
        match self {
            TaskField::Pid | TaskField::Ppid => 4,
            TaskField::Comm => TASK_COMM_LEN,
            TaskField::TasksNext | TaskField::TasksPrev | TaskField::Parent => 8,
        }
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TaskField::Pid => "pid",
            TaskField::Ppid => "ppid",
            TaskField::Comm => "comm",
            TaskField::TasksNext => "tasks.next",
            TaskField::TasksPrev => "tasks.prev",
            TaskField::Parent => "parent",
        };
        f.write_str(name)
    }
}

/// The fields of one descriptor, copied out of the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptorView {
    pub pid: i32,
    /// Only present when the layout carries an embedded ppid field
    pub ppid: Option<i32>,
    pub comm: [u8; TASK_COMM_LEN],
    pub list_next_vaddr: u64,
    pub list_prev_vaddr: u64,
    pub parent_vaddr: u64,
}

impl ProcessDescriptorView {
    pub fn name(&self) -> String {
        comm_to_string(&self.comm)
    }

    pub fn is_idle_task(&self) -> bool {
        is_idle_comm(&self.comm)
    }
}

/// Bytes of a comm buffer up to its first NUL.
pub fn comm_bytes(comm: &[u8]) -> &[u8] {
    let end = memchr::memchr(0, comm).unwrap_or(comm.len());
    &comm[..end]
}

pub fn comm_to_string(comm: &[u8]) -> String {
    String::from_utf8_lossy(comm_bytes(comm)).to_string()
}

/// True if the buffer holds exactly `swapper/0`, NUL-padded.
pub fn is_idle_comm(comm: &[u8]) -> bool {
    comm_bytes(comm) == IDLE_TASK_COMM
}

/// Reads descriptor fields at their layout offsets.
///
/// A descriptor must sit inside a single capture block: any field whose bytes
/// leave the block holding the descriptor base is a `StraddlesBlock` error.
pub struct TaskAccessor<'a> {
    layout: &'a TaskLayout,
}

impl<'a> TaskAccessor<'a> {
    pub fn new(layout: &'a TaskLayout) -> Self {
        TaskAccessor { layout }
    }

    /// Read the raw bytes of `field` from the descriptor at `phys_base`.
    pub fn read_field<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        phys_base: u64,
        field: TaskField,
    ) -> Result<Vec<u8>> {
        let offset = self.layout.offset_of(field).ok_or_else(|| {
            AnalysisError::ProfileError(format!("layout has no offset for {}", field))
        })?;
        let len = field.size();

        let location = dump
            .index()
            .lookup(phys_base)
            .ok_or(AnalysisError::Unresolvable {
                addr: phys_base,
                stage: "descriptor base",
            })?;

        let field_paddr = phys_base.checked_add(offset as u64).ok_or(AnalysisError::Unresolvable {
            addr: phys_base,
            stage: "descriptor field",
        })?;

        let contained = dump
            .index()
            .block(location.block)
            .map(|block| block.contains_range(field_paddr, len))
            .unwrap_or(false);
        if !contained {
            return Err(AnalysisError::StraddlesBlock {
                paddr: field_paddr,
                len,
                field,
            });
        }

        let mut buf = vec![0u8; len];
        dump.read_at(location.file_offset + offset as u64, &mut buf)?;
        Ok(buf)
    }

    pub fn read_pid<R: Read + Seek>(&self, dump: &mut MemoryDump<R>, phys_base: u64) -> Result<i32> {
        self.read_i32(dump, phys_base, TaskField::Pid)
    }

    pub fn read_comm<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        phys_base: u64,
    ) -> Result<[u8; TASK_COMM_LEN]> {
        let raw = self.read_field(dump, phys_base, TaskField::Comm)?;
        let mut comm = [0u8; TASK_COMM_LEN];
        comm.copy_from_slice(&raw);
        Ok(comm)
    }

    /// Read an 8-byte pointer field (list links or parent)
    pub fn read_pointer<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        phys_base: u64,
        field: TaskField,
    ) -> Result<u64> {
        let raw = self.read_field(dump, phys_base, field)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&raw);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read every field the walk needs from one descriptor
    pub fn read_view<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        phys_base: u64,
    ) -> Result<ProcessDescriptorView> {
        let ppid = match self.layout.ppid {
            Some(_) => Some(self.read_i32(dump, phys_base, TaskField::Ppid)?),
            None => None,
        };

        Ok(ProcessDescriptorView {
            pid: self.read_pid(dump, phys_base)?,
            ppid,
            comm: self.read_comm(dump, phys_base)?,
            list_next_vaddr: self.read_pointer(dump, phys_base, TaskField::TasksNext)?,
            list_prev_vaddr: self.read_pointer(dump, phys_base, TaskField::TasksPrev)?,
            parent_vaddr: self.read_pointer(dump, phys_base, TaskField::Parent)?,
        })
    }

    fn read_i32<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        phys_base: u64,
        field: TaskField,
    ) -> Result<i32> {
        let raw = self.read_field(dump, phys_base, field)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&raw);
        Ok(i32::from_le_bytes(buf))
    }
}
