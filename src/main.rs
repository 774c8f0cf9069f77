//! Main entry point for the taskwalk tool
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};

use taskwalk::cli::args::{Cli, OutputFormatArg, PluginCommand};
use taskwalk::core::offsets::TaskLayout;
use taskwalk::formats::traits::{OutputDestination, OutputFormat, OutputWriter};
use taskwalk::kernel::process_walker::ProcessWalker;
use taskwalk::memory::MemoryDump;
use taskwalk::plugins::plugin_trait::{AnalysisContext, ForensicPlugin, PluginOutput};
use taskwalk::plugins::{PsListPlugin, PsTreePlugin};
use taskwalk::symbols::SymbolTable;
use taskwalk::translation::ShiftDetector;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut dump = MemoryDump::open(&cli.memory_dump)
        .with_context(|| format!("opening memory capture {}", cli.memory_dump.display()))?;
    info!(
        "Indexed {} capture blocks, highest physical address 0x{:x}",
        dump.index().len(),
        dump.pa_max()
    );

    let symbols = SymbolTable::load(&cli.symbols)
        .with_context(|| format!("loading symbols from {}", cli.symbols.display()))?;
    info!("Loaded {} symbols", symbols.symbol_count());

    let layout = match &cli.layout {
        Some(path) => TaskLayout::load(path)
            .with_context(|| format!("loading task_struct layout from {}", path.display()))?,
        None => TaskLayout::default(),
    };

    let detector = if cli.shifts.is_empty() {
        ShiftDetector::default()
    } else {
        ShiftDetector::new(cli.shifts.clone())
    };

    let mut walker = ProcessWalker::calibrate(&mut dump, &symbols, &layout, &detector)
        .context("calibrating address translation")?;
    let processes = walker.walk().context("walking the task list")?;

    let plugin: Box<dyn ForensicPlugin> = match &cli.plugin {
        Some(PluginCommand::Pslist { pid, name }) => Box::new(PsListPlugin::new(*pid, name.as_deref())?),
        Some(PluginCommand::Pstree) => Box::new(PsTreePlugin),
        None => Box::new(PsListPlugin::default()),
    };
    info!("Running plugin {}: {}", plugin.name(), plugin.description());

    let output_writer = OutputWriter::new(output_format(cli.format), output_destination(&cli));
    let context = AnalysisContext {
        processes: &processes,
    };

    match plugin.run(&context)? {
        PluginOutput::Processes(processes) => {
            if processes.is_empty() {
                eprintln!("No processes found matching the specified criteria.");
            } else {
                output_writer.write_processes(&processes)?;
            }
        }
        PluginOutput::Tree(tree) => output_writer.write_raw(&tree)?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();
}

fn output_format(format: OutputFormatArg) -> OutputFormat {
    match format {
        OutputFormatArg::Text => OutputFormat::Text,
        OutputFormatArg::Csv => OutputFormat::Csv,
        OutputFormatArg::Json => OutputFormat::Json,
        OutputFormatArg::Jsonl => OutputFormat::Jsonl,
    }
}

fn output_destination(cli: &Cli) -> OutputDestination {
    match &cli.output {
        Some(path) => OutputDestination::File(path.clone()),
        None => OutputDestination::Stdout,
    }
}
