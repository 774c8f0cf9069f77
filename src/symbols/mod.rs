//! Kernel symbol table loading (System.map, kallsyms, dwarf2json)
use crate::core::dwarf::DwarfSymbols;
use crate::error::{AnalysisError, Result};
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Structure to hold symbol information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: String,
    pub vaddr: u64,
}

/// Name -> virtual address mapping for one kernel build.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, u64>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol. The first address seen for a name wins.
    pub fn add_symbol(&mut self, name: String, vaddr: u64) {
        self.symbols.entry(name).or_insert(vaddr);
    }

    /// Load a symbol file, choosing the parser by extension (`.json` is dwarf2json)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let dwarf = DwarfSymbols::load_from_file(path)?;
            Ok(Self::from_dwarf(&dwarf))
        } else {
            Self::load_system_map(path)
        }
    }

    /// Parse a System.map or kallsyms file
    pub fn load_system_map<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::parse_system_map(BufReader::new(file))
    }

    /// Parse `<hex address> <type> <name> [module]` lines.
    ///
    /// Lines that do not have that shape are skipped, as are zero addresses
    /// (kallsyms read without privileges reports every address as 0).
    pub fn parse_system_map<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = SymbolTable::new();
        let mut skipped = 0usize;

        for line_result in reader.lines() {
            let line = line_result?;
            let parts: Vec<&str> = line.split_whitespace().collect();

            if parts.len() < 3 || parts[1].len() != 1 {
                skipped += 1;
                continue;
            }

            match u64::from_str_radix(parts[0].trim_start_matches("0x"), 16) {
                Ok(0) => skipped += 1,
                Ok(address) => table.add_symbol(parts[2].to_string(), address),
                Err(_) => skipped += 1,
            }
        }

        debug!(
            "Loaded {} symbols ({} lines skipped)",
            table.symbol_count(),
            skipped
        );

        if table.symbols.is_empty() {
            return Err(AnalysisError::SymbolError(
                "no symbols found in symbol file".to_string(),
            ));
        }

        Ok(table)
    }

    /// Take the symbol addresses out of a dwarf2json file
    pub fn from_dwarf(dwarf: &DwarfSymbols) -> Self {
        let mut table = SymbolTable::new();
        for (name, address) in dwarf.symbols() {
            table.add_symbol(name.to_string(), address);
        }
        table
    }

    /// Get the address of a symbol by name
    pub fn get_symbol_address(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    /// Like `get_symbol_address`, but a missing symbol is an error
    pub fn require(&self, name: &str) -> Result<u64> {
        self.get_symbol_address(name)
            .ok_or_else(|| AnalysisError::SymbolNotFound(name.to_string()))
    }

    /// Resolve the first of several alternative names that is present
    pub fn require_any(&self, names: &[&str]) -> Result<SymbolEntry> {
        names
            .iter()
            .find_map(|name| {
                self.get_symbol_address(name).map(|vaddr| SymbolEntry {
                    name: name.to_string(),
                    vaddr,
                })
            })
            .ok_or_else(|| AnalysisError::SymbolNotFound(names.join(" / ")))
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SYSTEM_MAP: &str = "\
ffffffff81000000 T _text
ffffffff81c15500 D init_task
ffffffff81c0a000 D init_top_pgt
ffffffff81c15500 d init_task_dup_check
ffffffff82000000 D init_task
0000000000000000 A fixed_percpu_data
garbage line
ffffffffc0a01000 t nf_hook [nf_tables]
";

    #[test]
    fn test_parse_system_map() {
        let table = SymbolTable::parse_system_map(Cursor::new(SYSTEM_MAP)).unwrap();

        assert_eq!(table.get_symbol_address("_text"), Some(0xffffffff81000000));
        assert_eq!(table.get_symbol_address("nf_hook"), Some(0xffffffffc0a01000));
        assert_eq!(table.get_symbol_address("fixed_percpu_data"), None);
        assert_eq!(table.symbol_count(), 5);
    }

    #[test]
    fn test_first_definition_wins() {
        let table = SymbolTable::parse_system_map(Cursor::new(SYSTEM_MAP)).unwrap();
        assert_eq!(table.require("init_task").unwrap(), 0xffffffff81c15500);
    }

    #[test]
    fn test_missing_symbol() {
        let table = SymbolTable::parse_system_map(Cursor::new(SYSTEM_MAP)).unwrap();

        assert!(matches!(
            table.require("init_level4_pgt"),
            Err(AnalysisError::SymbolNotFound(name)) if name == "init_level4_pgt"
        ));

        let pgt = table.require_any(&["init_level4_pgt", "init_top_pgt"]).unwrap();
        assert_eq!(pgt.name, "init_top_pgt");
        assert_eq!(pgt.vaddr, 0xffffffff81c0a000);
        assert!(table.require_any(&["a", "b"]).is_err());
    }

    #[test]
    fn test_empty_map_is_symbol_error() {
        assert!(matches!(
            SymbolTable::parse_system_map(Cursor::new("not a symbol map\n")),
            Err(AnalysisError::SymbolError(_))
        ));
    }
}
