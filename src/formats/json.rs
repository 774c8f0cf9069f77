//! JSON output formatter for the taskwalk tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::kernel::ProcessRecord;
use serde::Serialize;

#[derive(Serialize)]
struct OutputWrapper<'a, T> {
    plugin: &'a str,
    timestamp: String,
    count: usize,
    results: &'a [T],
}

/// JSON formatter that outputs data in JSON format with metadata
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_processes(&self, processes: &[ProcessRecord]) -> Result<String, AnalysisError> {
        let wrapper = OutputWrapper {
            plugin: "pslist",
            timestamp: chrono::Utc::now().to_rfc3339(),
            count: processes.len(),
            results: processes,
        };

        let json = serde_json::to_string_pretty(&wrapper)?;
        Ok(json)
    }
}
