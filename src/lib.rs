//! Library crate for taskwalk: Linux process listing from LiME captures

pub mod error;
pub mod kernel;
pub mod memory;
pub mod symbols;
pub mod translation;

#[cfg(test)]
pub(crate) mod test_support;

// Core modules
pub mod core {
    pub mod dwarf;
    pub mod offsets;
}

// CLI modules
pub mod cli {
    pub mod args;
}

pub mod plugins;

// Format modules
pub mod formats {
    pub mod csv;
    pub mod json;
    pub mod jsonl;
    pub mod text;
    pub mod traits;
}
