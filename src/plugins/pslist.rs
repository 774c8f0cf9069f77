//! PsList plugin - lists processes found on the task list
use crate::error::AnalysisError;
use crate::plugins::plugin_trait::{AnalysisContext, ForensicPlugin, PluginOutput};
use regex::Regex;

#[derive(Debug, Default)]
pub struct PsListPlugin {
    pid: Option<i32>,
    name: Option<Regex>,
}

impl PsListPlugin {
    /// Build the plugin with optional pid and process-name (regex) filters
    pub fn new(pid: Option<i32>, name: Option<&str>) -> Result<Self, AnalysisError> {
        let name = name.map(Regex::new).transpose()?;
        Ok(PsListPlugin { pid, name })
    }
}

impl ForensicPlugin for PsListPlugin {
    fn name(&self) -> &str {
        "pslist"
    }

    fn description(&self) -> &str {
        "List running processes"
    }

    fn run(&self, context: &AnalysisContext) -> Result<PluginOutput, AnalysisError> {
        let processes = context
            .processes
            .iter()
            .filter(|p| self.pid.map_or(true, |pid| p.pid == pid))
            .filter(|p| self.name.as_ref().map_or(true, |re| re.is_match(&p.name)))
            .cloned()
            .collect();

        Ok(PluginOutput::Processes(processes))
    }
}
