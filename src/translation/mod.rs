//! Memory translation module for converting kernel virtual addresses to physical ones
use crate::error::{AnalysisError, Result};
use crate::memory::{MemoryDump, PhysRange};
use log::debug;
use std::io::{Read, Seek};

pub mod shift;

pub use shift::ShiftDetector;

// x86-64 4-level paging layout
const PML4_SHIFT: u32 = 39;
const PDPT_SHIFT: u32 = 30;
const PD_SHIFT: u32 = 21;
const PT_SHIFT: u32 = 12;
const INDEX_MASK: u64 = 0x1ff;
const PAGE_OFFSET_MASK: u64 = 0xfff;

/// Physical address bits of a table entry; drops the low control bits and NX.
const ENTRY_ADDR_MASK: u64 = 0x000f_ffff_ffff_f000;

const ENTRY_PRESENT: u64 = 1 << 0;
/// PS bit: a PDPT or PD entry maps a 1 GiB / 2 MiB page instead of a table.
const ENTRY_PAGE_SIZE: u64 = 1 << 7;

const HUGE_1G_OFFSET_MASK: u64 = (1 << PDPT_SHIFT) - 1;
const HUGE_2M_OFFSET_MASK: u64 = (1 << PD_SHIFT) - 1;

/// Calibration values discovered for one dump session.
///
/// Both fields are written once during calibration and only read afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationContext {
    identity_shift: Option<u64>,
    page_table_phys_base: Option<u64>,
}

impl TranslationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_shift(&self) -> Option<u64> {
        self.identity_shift
    }

    pub fn page_table_phys_base(&self) -> Option<u64> {
        self.page_table_phys_base
    }

    /// Record the linear shift chosen by the shift detector
    pub fn set_identity_shift(&mut self, shift: u64) {
        debug_assert!(self.identity_shift.is_none(), "identity shift set twice");
        self.identity_shift = Some(shift);
    }

    /// Record the physical base of the kernel's top-level page table
    pub fn set_page_table_base(&mut self, paddr: u64) {
        debug_assert!(self.page_table_phys_base.is_none(), "page table base set twice");
        self.page_table_phys_base = Some(paddr);
    }
}

/// The five fields of a 4-level x86-64 virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddressParts {
    pub pml4: u64,
    pub pdpt: u64,
    pub pd: u64,
    pub pt: u64,
    pub offset: u64,
}

impl VirtualAddressParts {
    pub fn split(vaddr: u64) -> Self {
        VirtualAddressParts {
            pml4: (vaddr >> PML4_SHIFT) & INDEX_MASK,
            pdpt: (vaddr >> PDPT_SHIFT) & INDEX_MASK,
            pd: (vaddr >> PD_SHIFT) & INDEX_MASK,
            pt: (vaddr >> PT_SHIFT) & INDEX_MASK,
            offset: vaddr & PAGE_OFFSET_MASK,
        }
    }
}

/// Converts kernel virtual addresses to physical addresses for one dump.
#[derive(Debug, Clone)]
pub struct AddressTranslator {
    context: TranslationContext,
}

impl AddressTranslator {
    pub fn new(context: TranslationContext) -> Self {
        AddressTranslator { context }
    }

    pub fn context(&self) -> &TranslationContext {
        &self.context
    }

    /// Translate a kernel virtual address to a physical address.
    ///
    /// Addresses inside the directly-mapped window `(shift, shift + PA_MAX]`
    /// are a plain subtraction; anything else goes through the page tables.
    pub fn translate<R: Read + Seek>(&self, dump: &mut MemoryDump<R>, vaddr: u64) -> Result<u64> {
        if vaddr == 0 {
            return Err(AnalysisError::Unresolvable {
                addr: 0,
                stage: "null pointer",
            });
        }

        if let Some(paddr) = self.direct_map(vaddr, dump.pa_max()) {
            return Ok(paddr);
        }

        self.walk_page_tables(dump, vaddr)
    }

    /// Fast path: linear shift over the directly-mapped region.
    pub fn direct_map(&self, vaddr: u64, pa_max: u64) -> Option<u64> {
        let shift = self.context.identity_shift?;
        if vaddr > shift && vaddr - shift <= pa_max {
            Some(vaddr - shift)
        } else {
            None
        }
    }

    /// General path: walk PML4 -> PDPT -> PD -> PT starting at the kernel's top-level table.
    pub fn walk_page_tables<R: Read + Seek>(
        &self,
        dump: &mut MemoryDump<R>,
        vaddr: u64,
    ) -> Result<u64> {
        let mut table = self
            .context
            .page_table_phys_base
            .ok_or(AnalysisError::NotCalibrated("page table base not resolved"))?;

        let parts = VirtualAddressParts::split(vaddr);
        debug!("Page walk for 0x{:x}: {:?}", vaddr, parts);

        // (stage, index, offset mask of a large page mapped at this level)
        let levels = [
            ("PML4 entry", parts.pml4, None),
            ("PDPT entry", parts.pdpt, Some(HUGE_1G_OFFSET_MASK)),
            ("PD entry", parts.pd, Some(HUGE_2M_OFFSET_MASK)),
            ("PT entry", parts.pt, None),
        ];

        for (stage, index, large_page) in levels {
            let entry_paddr = table
                .checked_add(8 * index)
                .ok_or(AnalysisError::Unresolvable { addr: vaddr, stage })?;

            let file_offset = match dump.index().resolve_range(entry_paddr, 8) {
                PhysRange::Contained { file_offset } => file_offset,
                _ => {
                    return Err(AnalysisError::Unresolvable {
                        addr: entry_paddr,
                        stage,
                    })
                }
            };

            let entry = dump.read_u64_at(file_offset)?;
            debug!("  {} at 0x{:x} = 0x{:x}", stage, entry_paddr, entry);

            if entry & ENTRY_PRESENT == 0 {
                return Err(AnalysisError::Unresolvable {
                    addr: entry_paddr,
                    stage,
                });
            }

            if let Some(offset_mask) = large_page {
                if entry & ENTRY_PAGE_SIZE != 0 {
                    let frame = entry & ENTRY_ADDR_MASK & !offset_mask;
                    return Ok(frame + (vaddr & offset_mask));
                }
            }

            table = entry & ENTRY_ADDR_MASK;
        }

        Ok(table + parts.offset)
    }
}
