//! Text (table) output formatter for the taskwalk tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::kernel::ProcessRecord;
use prettytable::{Cell, Row, Table};

/// Text formatter that outputs data in a human-readable table format
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format_processes(&self, processes: &[ProcessRecord]) -> Result<String, AnalysisError> {
        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(Row::new(vec![
            Cell::new("OFFSET").style_spec("c"),
            Cell::new("PID").style_spec("c"),
            Cell::new("PPID").style_spec("c"),
            Cell::new("NAME").style_spec("c"),
            Cell::new("PADDR").style_spec("c"),
            Cell::new("NEXT TASK").style_spec("c"),
            Cell::new("PARENT TASK").style_spec("c"),
        ]));

        for proc in processes {
            table.add_row(Row::new(vec![
                Cell::new(&format!("0x{:x}", proc.offset)),
                Cell::new(&proc.pid.to_string()).style_spec("r"),
                Cell::new(&proc.ppid.to_string()).style_spec("r"),
                Cell::new(&proc.name),
                Cell::new(&format!("0x{:x}", proc.paddr)),
                Cell::new(&format!("0x{:x}", proc.next_vaddr)),
                Cell::new(&format!("0x{:x}", proc.parent_vaddr)),
            ]));
        }

        Ok(table.to_string())
    }
}
