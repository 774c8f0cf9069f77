//! Linear-shift calibration using the idle task as a known-content oracle
use crate::core::offsets::TaskLayout;
use crate::error::{AnalysisError, Result};
use crate::kernel::task::{is_idle_comm, TaskAccessor};
use crate::memory::MemoryDump;
use log::{debug, info};
use std::io::{Read, Seek};

/// Historical x86-64 linear-mapping bases, tried in this order.
pub const LEGACY_SHIFTS: [u64; 4] = [
    0xffff880000000000, // direct map, 4-level paging (pre-4.20)
    0xffffffff80000000, // __START_KERNEL_map
    0xffffffff80000000 - 0x1000000,
    0xffffffff7fe00000,
];

/// Picks the linear shift that places `init_task` on a descriptor whose comm is `swapper/0`.
#[derive(Debug, Clone)]
pub struct ShiftDetector {
    candidates: Vec<u64>,
}

impl Default for ShiftDetector {
    fn default() -> Self {
        ShiftDetector {
            candidates: LEGACY_SHIFTS.to_vec(),
        }
    }
}

impl ShiftDetector {
    /// Use a caller-supplied candidate list, tried in order
    pub fn new(candidates: Vec<u64>) -> Self {
        ShiftDetector { candidates }
    }

    pub fn candidates(&self) -> &[u64] {
        &self.candidates
    }

    /// Return the first candidate whose implied physical address holds the idle task.
    ///
    /// Candidates above `init_task_vaddr`, or whose implied descriptor is not
    /// fully captured, are skipped. No search beyond the fixed list is attempted.
    pub fn detect<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        layout: &TaskLayout,
        init_task_vaddr: u64,
    ) -> Result<u64> {
        let accessor = TaskAccessor::new(layout);

        for &candidate in &self.candidates {
            let Some(paddr) = init_task_vaddr.checked_sub(candidate) else {
                debug!("Shift 0x{:x}: above init_task, skipping", candidate);
                continue;
            };

            let comm = match accessor.read_comm(dump, paddr) {
                Ok(comm) => comm,
                Err(AnalysisError::Unresolvable { .. }) | Err(AnalysisError::StraddlesBlock { .. }) => {
                    debug!("Shift 0x{:x}: 0x{:x} not in dump", candidate, paddr);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if is_idle_comm(&comm) {
                info!(
                    "Found viable linear shift 0x{:x} (init_task at physical 0x{:x})",
                    candidate, paddr
                );
                return Ok(candidate);
            }

            debug!(
                "Shift 0x{:x}: comm at 0x{:x} is {:?}, not the idle task",
                candidate,
                paddr,
                String::from_utf8_lossy(&comm)
            );
        }

        Err(AnalysisError::NoViableShift {
            vaddr: init_task_vaddr,
            tried: self.candidates.len(),
        })
    }
}
