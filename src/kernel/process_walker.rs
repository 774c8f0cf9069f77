//! Process list walking, starting at init_task
use crate::core::offsets::TaskLayout;
use crate::error::{AnalysisError, Result};
use crate::kernel::task::{ProcessDescriptorView, TaskAccessor};
use crate::kernel::ProcessRecord;
use crate::memory::MemoryDump;
use crate::symbols::SymbolTable;
use crate::translation::{AddressTranslator, ShiftDetector, TranslationContext};
use log::{debug, info};
use std::collections::HashSet;
use std::io::{Read, Seek};

pub const INIT_TASK_SYMBOL: &str = "init_task";

/// Names of the kernel's top-level page table; `init_level4_pgt` before 4.14.
pub const PAGE_TABLE_SYMBOLS: [&str; 2] = ["init_top_pgt", "init_level4_pgt"];

/// Walks the circular `tasks` list of one dump.
pub struct ProcessWalker<'a, R> {
    dump: &'a mut MemoryDump<R>,
    layout: &'a TaskLayout,
    translator: AddressTranslator,
    init_task_vaddr: u64,
}

impl<'a, R: Read + Seek> ProcessWalker<'a, R> {
    /// Walker over an already-calibrated translator
    pub fn new(
        dump: &'a mut MemoryDump<R>,
        layout: &'a TaskLayout,
        translator: AddressTranslator,
        init_task_vaddr: u64,
    ) -> Self {
        ProcessWalker {
            dump,
            layout,
            translator,
            init_task_vaddr,
        }
    }

    /// Detect the linear shift, resolve the page-table base and build a walker.
    pub fn calibrate(
        dump: &'a mut MemoryDump<R>,
        symbols: &SymbolTable,
        layout: &'a TaskLayout,
        detector: &ShiftDetector,
    ) -> Result<Self> {
        let init_task_vaddr = symbols.require(INIT_TASK_SYMBOL)?;
        debug!("init_task symbol at 0x{:x}", init_task_vaddr);

        let mut context = TranslationContext::new();
        let shift = detector.detect(dump, layout, init_task_vaddr)?;
        context.set_identity_shift(shift);

        let pgt = symbols.require_any(&PAGE_TABLE_SYMBOLS)?;
        let pgt_paddr = pgt
            .vaddr
            .checked_sub(shift)
            .ok_or(AnalysisError::Unresolvable {
                addr: pgt.vaddr,
                stage: "page table base",
            })?;
        context.set_page_table_base(pgt_paddr);
        info!(
            "{} at 0x{:x} -> physical 0x{:x}",
            pgt.name, pgt.vaddr, pgt_paddr
        );

        Ok(Self::new(
            dump,
            layout,
            AddressTranslator::new(context),
            init_task_vaddr,
        ))
    }

    pub fn translator(&self) -> &AddressTranslator {
        &self.translator
    }

    /// Enumerate every task on the list, in list order, starting with the idle task.
    ///
    /// The walk ends when the list leads back to init_task. Reaching another
    /// pid-0 descriptor, or any descriptor a second time, means the list is
    /// corrupt and the walk fails rather than returning a partial list.
    pub fn walk(&mut self) -> Result<Vec<ProcessRecord>> {
        let accessor = TaskAccessor::new(self.layout);

        let init_base = self.translator.translate(self.dump, self.init_task_vaddr)?;
        let init_view = accessor.read_view(self.dump, init_base)?;
        if !init_view.is_idle_task() {
            return Err(AnalysisError::InvalidStructure(format!(
                "init_task at 0x{:x} has comm {:?}, expected swapper/0",
                init_base,
                init_view.name()
            )));
        }
        debug!("Located init_task at physical 0x{:x}", init_base);

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut base = init_base;
        let mut view = init_view;

        loop {
            visited.insert(base);
            let record = self.record(&accessor, base, &view)?;
            debug!(
                "Task {} ({}) at 0x{:x}, next=0x{:x}",
                record.pid, record.name, base, view.list_next_vaddr
            );
            records.push(record);

            let next_base = self.next_base(&view)?;
            if next_base == init_base {
                debug!("Completed circular list - back at init_task");
                break;
            }
            if visited.contains(&next_base) {
                return Err(AnalysisError::InvalidStructure(format!(
                    "task list loops back to 0x{:x} without returning to init_task",
                    next_base
                )));
            }

            view = accessor.read_view(self.dump, next_base)?;
            if view.pid == 0 {
                return Err(AnalysisError::InvalidStructure(format!(
                    "second pid 0 task at 0x{:x} after {} tasks",
                    next_base,
                    records.len()
                )));
            }
            if let Some(end) = self.dump.position_paddr()? {
                debug!("Read descriptor 0x{:x} (last read ended at 0x{:x})", next_base, end);
            }
            base = next_base;
        }

        info!("Walked {} tasks", records.len());
        Ok(records)
    }

    /// Physical base of the descriptor `tasks.next` points into.
    fn next_base(&mut self, view: &ProcessDescriptorView) -> Result<u64> {
        // tasks.next points at the embedded list_head, not the descriptor start
        let next_vaddr = view
            .list_next_vaddr
            .checked_sub(self.layout.tasks as u64)
            .ok_or(AnalysisError::Unresolvable {
                addr: view.list_next_vaddr,
                stage: "tasks.next",
            })?;
        self.translator.translate(self.dump, next_vaddr)
    }

    fn parent_pid(&mut self, accessor: &TaskAccessor, view: &ProcessDescriptorView) -> Result<i32> {
        if let Some(ppid) = view.ppid {
            return Ok(ppid);
        }
        let parent_base = self.translator.translate(self.dump, view.parent_vaddr)?;
        accessor.read_pid(self.dump, parent_base)
    }

    fn record(
        &mut self,
        accessor: &TaskAccessor,
        base: u64,
        view: &ProcessDescriptorView,
    ) -> Result<ProcessRecord> {
        let ppid = self.parent_pid(accessor, view)?;
        let offset = self
            .dump
            .index()
            .lookup(base)
            .map(|location| location.file_offset)
            .ok_or(AnalysisError::Unresolvable {
                addr: base,
                stage: "descriptor base",
            })?;

        Ok(ProcessRecord {
            pid: view.pid,
            ppid,
            name: view.name(),
            paddr: base,
            offset,
            next_vaddr: view.list_next_vaddr,
            parent_vaddr: view.parent_vaddr,
        })
    }
}
