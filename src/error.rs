//! Custom error types for the application
use thiserror::Error;

use crate::kernel::task::TaskField;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt capture at file offset 0x{offset:x}: {reason}")]
    CorruptCapture { offset: u64, reason: String },

    #[error("Symbol error: {0}")]
    SymbolError(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No viable linear shift for init_task at 0x{vaddr:x} ({tried} candidates tried)")]
    NoViableShift { vaddr: u64, tried: usize },

    #[error("Address 0x{addr:x} unresolvable ({stage})")]
    Unresolvable { addr: u64, stage: &'static str },

    #[error("Field {field} at 0x{paddr:x} (+{len} bytes) straddles a capture block boundary")]
    StraddlesBlock {
        paddr: u64,
        len: usize,
        field: TaskField,
    },

    #[error("Translation context not calibrated: {0}")]
    NotCalibrated(&'static str),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Layout profile error: {0}")]
    ProfileError(String),

    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("CSV into_inner error: {0}")]
    CsvIntoInnerError(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),

    #[error("UTF-8 conversion error: {0}")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
