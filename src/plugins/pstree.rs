//! PsTree plugin - shows the parent/child process tree
use crate::error::AnalysisError;
use crate::kernel::ProcessRecord;
use crate::plugins::plugin_trait::{AnalysisContext, ForensicPlugin, PluginOutput};
use std::collections::{BTreeMap, HashSet};

pub struct PsTreePlugin;

/// Parent/child relationships keyed by pid
pub struct ProcessTree<'a> {
    process_map: BTreeMap<i32, &'a ProcessRecord>,
    parent_map: BTreeMap<i32, Vec<i32>>, // parent PID -> child PIDs
    roots: Vec<i32>,
}

impl<'a> ProcessTree<'a> {
    pub fn build_from_processes(processes: &'a [ProcessRecord]) -> Self {
        let process_map: BTreeMap<i32, &ProcessRecord> =
            processes.iter().map(|p| (p.pid, p)).collect();
        let mut parent_map: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        let mut roots = Vec::new();

        for proc in process_map.values() {
            // The idle task is its own parent
            if proc.ppid != proc.pid && process_map.contains_key(&proc.ppid) {
                parent_map.entry(proc.ppid).or_default().push(proc.pid);
            } else {
                roots.push(proc.pid);
            }
        }

        ProcessTree {
            process_map,
            parent_map,
            roots,
        }
    }

    pub fn render(&self) -> String {
        let mut result = String::new();
        let mut seen = HashSet::new();

        for &root_pid in &self.roots {
            self.render_process(root_pid, 0, &mut seen, &mut result);
        }

        result
    }

    fn render_process(&self, pid: i32, depth: usize, seen: &mut HashSet<i32>, result: &mut String) {
        if !seen.insert(pid) {
            return;
        }
        if let Some(proc) = self.process_map.get(&pid) {
            result.push_str(&format!(
                "{}{} (PID: {}, PPID: {})\n",
                "  ".repeat(depth),
                proc.name,
                proc.pid,
                proc.ppid
            ));

            if let Some(children) = self.parent_map.get(&pid) {
                for &child_pid in children {
                    self.render_process(child_pid, depth + 1, seen, result);
                }
            }
        }
    }
}

impl ForensicPlugin for PsTreePlugin {
    fn name(&self) -> &str {
        "pstree"
    }

    fn description(&self) -> &str {
        "Show process tree visualization"
    }

    fn run(&self, context: &AnalysisContext) -> Result<PluginOutput, AnalysisError> {
        let tree = ProcessTree::build_from_processes(context.processes);
        Ok(PluginOutput::Tree(tree.render()))
    }
}
