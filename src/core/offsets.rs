//! task_struct field offsets for the target kernel build
use crate::core::dwarf::DwarfSymbols;
use crate::error::{AnalysisError, Result};
use crate::kernel::task::TaskField;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Offsets of the descriptor fields read by the walker, measured from the
/// start of task_struct.
///
/// The defaults were profiled against one specific kernel build; any other
/// kernel needs its own profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLayout {
    pub pid: usize,
    /// Embedded parent pid. Most kernels have none and the parent pointer is followed instead.
    #[serde(default)]
    pub ppid: Option<usize>,
    pub comm: usize,
    /// The `tasks` list_head (next, prev)
    pub tasks: usize,
    pub parent: usize,
}

impl Default for TaskLayout {
    fn default() -> Self {
        TaskLayout {
            pid: 0x450,
            ppid: None,
            comm: 0x608,
            tasks: 0x358,
            parent: 0x468,
        }
    }
}

impl TaskLayout {
    /// Offset of a field within the descriptor, if the layout has one
    pub fn offset_of(&self, field: TaskField) -> Option<usize> {
        match field {
            TaskField::Pid => Some(self.pid),
            TaskField::Ppid => self.ppid,
            TaskField::Comm => Some(self.comm),
            TaskField::TasksNext => Some(self.tasks),
            TaskField::TasksPrev => self.tasks.checked_add(8),
            TaskField::Parent => Some(self.parent),
        }
    }

    /// Load a layout from a file, detecting its flavour:
    /// - dwarf2json / ISF (`user_types.task_struct.fields`)
    /// - Volatility 2 vtypes (`all_vtypes.task_struct`)
    /// - a plain layout profile (`{"pid": .., "comm": .., ..}`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        let layout = if value.get("user_types").is_some() {
            debug!("Layout file looks like dwarf2json");
            let dwarf: DwarfSymbols = serde_json::from_value(value)?;
            Self::from_dwarf(&dwarf)?
        } else if value.get("all_vtypes").is_some() {
            debug!("Layout file looks like vtypes");
            Self::from_vtypes(&value)?
        } else {
            serde_json::from_value(value)?
        };

        layout.validate()?;
        debug!("Using task_struct layout: {:?}", layout);
        Ok(layout)
    }

    /// Check that every field this layout defines ends at a representable offset.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            TaskField::Pid,
            TaskField::Ppid,
            TaskField::Comm,
            TaskField::TasksNext,
            TaskField::TasksPrev,
            TaskField::Parent,
        ];

        for field in fields {
            if field == TaskField::Ppid && self.ppid.is_none() {
                continue;
            }
            let end = self
                .offset_of(field)
                .and_then(|offset| offset.checked_add(field.size()));
            if end.is_none() {
                return Err(AnalysisError::ProfileError(format!(
                    "task_struct.{} offset out of range",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Build a layout from dwarf2json struct information
    pub fn from_dwarf(dwarf: &DwarfSymbols) -> Result<Self> {
        let field = |name: &str| {
            dwarf
                .get_field_offset("task_struct", name)
                .ok_or_else(|| missing_field("dwarf2json", name))
        };

        let parent = field("parent").or_else(|_| field("real_parent"))?;

        Ok(TaskLayout {
            pid: field("pid")?,
            ppid: None,
            comm: field("comm")?,
            tasks: field("tasks")?,
            parent,
        })
    }

    /// Build a layout from a Volatility 2 vtypes document:
    /// `all_vtypes.task_struct = [size, {field: [offset, type]}]`
    pub fn from_vtypes(value: &serde_json::Value) -> Result<Self> {
        let fields = value
            .pointer("/all_vtypes/task_struct/1")
            .ok_or_else(|| AnalysisError::ProfileError("vtypes has no task_struct".to_string()))?;

        let field = |name: &str| -> Result<usize> {
            fields
                .get(name)
                .and_then(|f| f.get(0))
                .and_then(|offset| offset.as_u64())
                .map(|offset| offset as usize)
                .ok_or_else(|| missing_field("vtypes", name))
        };

        Ok(TaskLayout {
            pid: field("pid")?,
            ppid: None,
            comm: field("comm")?,
            tasks: field("tasks")?,
            parent: field("parent")?,
        })
    }
}

fn missing_field(source: &str, name: &str) -> AnalysisError {
    AnalysisError::ProfileError(format!("{} has no task_struct.{} offset", source, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_layout() {
        let layout = TaskLayout::default();
        assert_eq!(layout.offset_of(TaskField::Pid), Some(0x450));
        assert_eq!(layout.offset_of(TaskField::Comm), Some(0x608));
        assert_eq!(layout.offset_of(TaskField::TasksNext), Some(0x358));
        assert_eq!(layout.offset_of(TaskField::TasksPrev), Some(0x360));
        assert_eq!(layout.offset_of(TaskField::Parent), Some(0x468));
        assert_eq!(layout.offset_of(TaskField::Ppid), None);
    }

    #[test]
    fn test_load_plain_profile() {
        let file = write_temp(r#"{"pid": 808, "ppid": 812, "comm": 1192, "tasks": 856, "parent": 800}"#);
        let layout = TaskLayout::load(file.path()).unwrap();
        assert_eq!(
            layout,
            TaskLayout {
                pid: 808,
                ppid: Some(812),
                comm: 1192,
                tasks: 856,
                parent: 800,
            }
        );
    }

    #[test]
    fn test_load_dwarf2json() {
        let file = write_temp(
            r#"{
                "symbols": {"init_task": {"address": 18446744071594612000}},
                "user_types": {
                    "task_struct": {
                        "size": 9216,
                        "fields": {
                            "pid": {"offset": 2512, "type": "int"},
                            "comm": {"offset": 3056},
                            "tasks": {"offset": 2280},
                            "real_parent": {"offset": 2528}
                        }
                    }
                }
            }"#,
        );
        let layout = TaskLayout::load(file.path()).unwrap();
        assert_eq!(layout.pid, 2512);
        assert_eq!(layout.comm, 3056);
        assert_eq!(layout.tasks, 2280);
        assert_eq!(layout.parent, 2528);
    }

    #[test]
    fn test_load_vtypes() {
        let file = write_temp(
            r#"{"all_vtypes": {"task_struct": [6400, {
                "pid": [1104, ["int"]],
                "comm": [1544, ["array", 16, ["char"]]],
                "tasks": [856, ["list_head"]],
                "parent": [1128, ["pointer", ["task_struct"]]]
            }]}}"#,
        );
        let layout = TaskLayout::load(file.path()).unwrap();
        assert_eq!(layout, TaskLayout::default());
    }

    #[test]
    fn test_overflowing_offset_is_profile_error() {
        let layout = TaskLayout {
            tasks: usize::MAX,
            ..TaskLayout::default()
        };
        assert_eq!(layout.offset_of(TaskField::TasksPrev), None);
        assert!(matches!(layout.validate(), Err(AnalysisError::ProfileError(_))));

        let file = write_temp(&format!(
            r#"{{"pid": 1104, "comm": 1544, "tasks": {}, "parent": 1128}}"#,
            usize::MAX
        ));
        assert!(matches!(
            TaskLayout::load(file.path()),
            Err(AnalysisError::ProfileError(msg)) if msg.contains("task_struct.tasks")
        ));
    }

    #[test]
    fn test_missing_field_is_profile_error() {
        let file = write_temp(r#"{"all_vtypes": {"task_struct": [6400, {"pid": [1104, ["int"]]}]}}"#);
        assert!(matches!(
            TaskLayout::load(file.path()),
            Err(AnalysisError::ProfileError(_))
        ));
    }
}
