/// Serializable views of assets and tasks
///
/// These are what the control plane hands out for the current selection.

use super::entities::{Asset, Task};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Asset as seen by external consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub name: String,
    pub path: String,
    pub folder: String,
    pub tasks: Vec<String>, // task names only
}

impl AssetRecord {
    pub fn new(asset: &Asset, folder_path: &Path, task_names: Vec<String>) -> Self {
        Self {
            name: asset.name.clone(),
            path: asset.path.display().to_string(),
            folder: folder_path.display().to_string(),
            tasks: task_names,
        }
    }
}

/// Task as seen by external consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub path: String,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            path: task.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_record_json_shape() {
        let asset = Asset::new(Path::new("/p/chars"), "Hero");
        let record = AssetRecord::new(
            &asset,
            Path::new("/p/chars"),
            vec!["Modelling".to_string(), "Rigging".to_string()],
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], "Hero");
        assert_eq!(value["path"], "/p/chars/Hero");
        assert_eq!(value["folder"], "/p/chars");
        assert_eq!(value["tasks"], serde_json::json!(["Modelling", "Rigging"]));
    }

    #[test]
    fn test_task_record_from_task() {
        let task = Task::new("/p/chars/Hero/Modelling");
        let record = TaskRecord::from(&task);
        assert_eq!(record.name, "Modelling");
        assert_eq!(record.path, "/p/chars/Hero/Modelling");
    }
}
