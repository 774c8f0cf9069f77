//! CSV output formatter for the taskwalk tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::kernel::ProcessRecord;
use csv::Writer;

/// CSV formatter that outputs data in comma-separated values format
pub struct CsvFormatter;

impl OutputFormatter for CsvFormatter {
    fn format_processes(&self, processes: &[ProcessRecord]) -> Result<String, AnalysisError> {
        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record([
            "offset",
            "pid",
            "ppid",
            "name",
            "paddr",
            "next_task",
            "parent_task",
        ])?;

        for proc in processes {
            wtr.write_record(&[
                format!("0x{:x}", proc.offset),
                proc.pid.to_string(),
                proc.ppid.to_string(),
                proc.name.clone(),
                format!("0x{:x}", proc.paddr),
                format!("0x{:x}", proc.next_vaddr),
                format!("0x{:x}", proc.parent_vaddr),
            ])?;
        }

        wtr.flush()?;
        let data = wtr.into_inner()?;
        Ok(String::from_utf8(data)?)
    }
}
