//! Command-line argument parsing for the taskwalk tool
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskwalk")]
#[command(about = "List Linux processes from a LiME memory capture", long_about = None)]
pub struct Cli {
    /// Path to LiME memory dump
    #[arg(value_name = "MEMORY_DUMP")]
    pub memory_dump: PathBuf,

    /// Plugin to run (default: pslist)
    #[command(subcommand)]
    pub plugin: Option<PluginCommand>,

    /// Path to symbol file (System.map, kallsyms, or dwarf2json)
    #[arg(short, long, value_name = "FILE")]
    pub symbols: PathBuf,

    /// task_struct layout (JSON profile, dwarf2json or vtypes)
    #[arg(short, long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Linear shift candidate to try, in hex; repeat to try several in order
    #[arg(long = "shift", value_name = "HEX", value_parser = parse_hex_u64)]
    pub shifts: Vec<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose output (calibration and status messages)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PluginCommand {
    /// List running processes
    Pslist {
        /// Filter by PID
        #[arg(long)]
        pid: Option<i32>,

        /// Filter by process name (regex)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show process tree
    Pstree,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormatArg {
    Text,
    Csv,
    Json,
    Jsonl,
}

/// Parse a hex address, with or without a `0x` prefix
pub fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{}': {}", s, e))
}
