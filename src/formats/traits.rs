//! Output format traits for the taskwalk tool
use crate::error::AnalysisError;
use crate::kernel::ProcessRecord;
use std::path::PathBuf;

/// Renders a process listing as a complete document
pub trait OutputFormatter: Send + Sync {
    fn format_processes(&self, processes: &[ProcessRecord]) -> Result<String, AnalysisError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
    Jsonl,
}

#[derive(Debug, Clone)]
pub enum OutputDestination {
    Stdout,
    File(PathBuf),
}

/// Output writer that combines format and destination
pub struct OutputWriter {
    formatter: Box<dyn OutputFormatter>,
    destination: OutputDestination,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, destination: OutputDestination) -> Self {
        let formatter: Box<dyn OutputFormatter> = match format {
            OutputFormat::Text => Box::new(crate::formats::text::TextFormatter),
            OutputFormat::Csv => Box::new(crate::formats::csv::CsvFormatter),
            OutputFormat::Json => Box::new(crate::formats::json::JsonFormatter),
            OutputFormat::Jsonl => Box::new(crate::formats::jsonl::JsonlFormatter),
        };

        Self {
            formatter,
            destination,
        }
    }

    /// Format processes and write them to the configured destination
    pub fn write_processes(&self, processes: &[ProcessRecord]) -> Result<(), AnalysisError> {
        let content = self.formatter.format_processes(processes)?;
        self.write_raw(&content)
    }

    /// Write pre-rendered text (the process tree) unchanged
    pub fn write_raw(&self, content: &str) -> Result<(), AnalysisError> {
        match &self.destination {
            OutputDestination::Stdout => {
                println!("{}", content);
            }
            OutputDestination::File(path) => {
                std::fs::write(path, content)?;
            }
        }

        Ok(())
    }
}
