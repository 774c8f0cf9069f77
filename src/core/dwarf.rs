//! dwarf2json parser for Volatility 3 compatible symbol files
use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SymbolEntry {
    #[serde(default)]
    address: u64,
}

#[derive(Debug, Deserialize)]
pub struct DwarfField {
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct DwarfStruct {
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub fields: Option<HashMap<String, DwarfField>>,
}

#[derive(Debug, Deserialize)]
pub struct DwarfSymbols {
    #[serde(default)]
    symbols: HashMap<String, SymbolEntry>,
    #[serde(default)]
    user_types: HashMap<String, DwarfStruct>,
}

impl DwarfSymbols {
    /// Load a dwarf2json file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let dwarf: DwarfSymbols = serde_json::from_str(&content)?;
        Ok(dwarf)
    }

    pub fn get_symbol_address(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).map(|entry| entry.address)
    }

    /// Get the offset of a field within a structure
    pub fn get_field_offset(&self, struct_name: &str, field_name: &str) -> Option<usize> {
        self.user_types
            .get(struct_name)?
            .fields
            .as_ref()?
            .get(field_name)
            .map(|field| field.offset)
    }

    /// Iterate over all (name, address) pairs. Zero addresses are skipped.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, u64)> {
        self.symbols
            .iter()
            .filter(|(_, entry)| entry.address != 0)
            .map(|(name, entry)| (name.as_str(), entry.address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut temp_file = NamedTempFile::new()?;
        let sample_content = r#"{
            "symbols": {
                "init_task": {"address": 18446744071594612000},
                "init_top_pgt": {"address": 18446744071593050112},
                "__absolute": {}
            },
            "user_types": {
                "task_struct": {
                    "size": 9216,
                    "fields": {
                        "pid": {"offset": 808, "type": "int"}
                    }
                }
            }
        }"#;
        temp_file.write_all(sample_content.as_bytes())?;
        temp_file.flush()?;

        let dwarf = DwarfSymbols::load_from_file(temp_file.path())?;
        assert_eq!(dwarf.get_symbol_address("init_task"), Some(18446744071594612000));
        assert_eq!(dwarf.get_field_offset("task_struct", "pid"), Some(808));
        assert_eq!(dwarf.get_field_offset("task_struct", "comm"), None);
        assert_eq!(dwarf.symbols().count(), 2);

        Ok(())
    }
}
