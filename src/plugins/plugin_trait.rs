//! Plugin system trait for the taskwalk tool
use crate::error::AnalysisError;
use crate::kernel::ProcessRecord;

/// Everything a plugin may look at: the walked task list, in list order.
pub struct AnalysisContext<'a> {
    pub processes: &'a [ProcessRecord],
}

/// Output from plugins
#[derive(Debug)]
pub enum PluginOutput {
    Processes(Vec<ProcessRecord>),
    Tree(String),
}

/// Trait that all forensic plugins must implement
pub trait ForensicPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn run(&self, context: &AnalysisContext) -> Result<PluginOutput, AnalysisError>;
}
