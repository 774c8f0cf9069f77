//! Kernel data structure parsing module
use serde::Serialize;

pub mod process_walker;
pub mod task;

/// One process found on the kernel's task list.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: i32,
    pub ppid: i32,
    pub name: String,
    pub paddr: u64,  // Physical address of the task_struct
    pub offset: u64, // File offset where the task_struct is found
    /// Raw `tasks.next` pointer as stored in the descriptor
    pub next_vaddr: u64,
    /// Raw `parent` pointer as stored in the descriptor
    pub parent_vaddr: u64,
}
