//! JSONL (JSON Lines) output formatter for the taskwalk tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::kernel::ProcessRecord;

/// JSONL formatter that outputs data as JSON objects, one per line
pub struct JsonlFormatter;

impl OutputFormatter for JsonlFormatter {
    fn format_processes(&self, processes: &[ProcessRecord]) -> Result<String, AnalysisError> {
        let mut output = String::new();

        for proc in processes {
            let line = serde_json::to_string(proc)?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }
}
