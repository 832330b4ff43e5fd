// The project facade
//
// Every create/delete hits the disk first and only touches the in-memory tree
// once the disk step worked. If something goes wrong in between, the two can
// drift apart; `load_project()` rebuilds the tree from disk and fixes it.

use super::selection::SelectionHandle;
use crate::error::{ConduitError, Result};
use crate::model::entities::dir_name;
use crate::model::{
    Asset, AssetId, AssetRecord, Folder, FolderId, NodeRef, ProjectTree, Task, TaskId, TaskRecord,
};
use crate::settings::{Settings, SettingsEntry};
use crate::versioning::{self, IngestRequest, IngestedVersion, VersionPattern};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Owns the project tree and keeps it in step with the filesystem
pub struct Conduit {
    settings: Settings,
    project: Option<ProjectTree>,
    // Trees replaced by a reload, kept so their ids still name a path
    retired: Vec<ProjectTree>,
    pattern: VersionPattern,
    matcher: SkimMatcherV2,
    selected_asset: Option<AssetId>,
    selected_task: Option<TaskId>,
    selection: SelectionHandle,
}

impl Conduit {
    /// Create an unloaded facade around `settings`
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            project: None,
            retired: Vec::new(),
            pattern: VersionPattern::new(),
            matcher: SkimMatcherV2::default(),
            selected_asset: None,
            selected_task: None,
            selection: SelectionHandle::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.project.is_some()
    }

    /// The loaded tree
    pub fn project(&self) -> Result<&ProjectTree> {
        self.project.as_ref().ok_or(ConduitError::NoProjectLoaded)
    }

    fn project_mut(&mut self) -> Result<&mut ProjectTree> {
        self.project.as_mut().ok_or(ConduitError::NoProjectLoaded)
    }

    /// (Re)load the project from the configured directory
    ///
    /// The previous tree is retired and the selection cleared. Ids from the
    /// retired tree become stale: lookups reject them, `delete_node` still
    /// accepts them.
    ///
    /// # Returns
    /// * `Ok(true)` - Project loaded
    /// * `Ok(false)` - No project directory configured, nothing loaded
    /// * `Err(ConduitError)` - If the directory is missing or unreadable
    pub fn load_project(&mut self) -> Result<bool> {
        let Some(root) = self
            .settings
            .get_str(SettingsEntry::ProjectDirectory)
            .map(PathBuf::from)
        else {
            return Ok(false);
        };

        let tree = ProjectTree::build(&root)?;
        tracing::info!(root = %root.display(), "project loaded");

        if let Some(old) = self.project.replace(tree) {
            self.retired.push(old);
        }
        self.selected_asset = None;
        self.selected_task = None;
        self.selection.clear();
        Ok(true)
    }

    /// Point the settings at `root` and load it
    pub fn open<P: AsRef<Path>>(&mut self, root: P) -> Result<()> {
        let root = root.as_ref().display().to_string();
        self.settings.set(SettingsEntry::ProjectDirectory.key(), root);
        self.load_project()?;
        Ok(())
    }

    /// Create a plain folder under `parent` (the root when `None`)
    ///
    /// The directory is created if missing. Calling this twice with the same
    /// name adds two nodes for the same directory.
    pub fn create_folder(&mut self, name: &str, parent: Option<FolderId>) -> Result<FolderId> {
        validate_name(name)?;
        let tree = self.project()?;
        let parent = parent.unwrap_or_else(|| tree.root());
        let parent_folder = tree.folder(parent)?;
        let path = parent_folder.path.join(name);

        if parent_folder.subfolders.iter().any(|id| {
            tree.folder(*id).map(|f| f.path == path).unwrap_or(false)
        }) {
            tracing::warn!(path = %path.display(), "folder node already exists, adding a duplicate");
        }

        fs::create_dir_all(&path)?;
        let id = self.project_mut()?.insert_folder(parent, Folder::new(&path))?;

        tracing::info!(path = %path.display(), "folder created");
        Ok(id)
    }

    /// Create an asset directory with its sidecar marker under `parent`
    pub fn create_asset(&mut self, name: &str, parent: FolderId) -> Result<AssetId> {
        validate_name(name)?;
        let tree = self.project()?;
        let parent_folder = tree.folder(parent)?;
        let asset = Asset::new(&parent_folder.path, name);

        if parent_folder.assets.iter().any(|id| {
            tree.asset(*id).map(|a| a.path == asset.path).unwrap_or(false)
        }) {
            tracing::warn!(path = %asset.path.display(), "asset node already exists, adding a duplicate");
        }

        fs::create_dir_all(&asset.path)?;
        // Touch, never truncate an existing marker
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(asset.sidecar_path())?;

        let path = asset.path.clone();
        let id = self.project_mut()?.insert_asset(parent, asset)?;

        tracing::info!(path = %path.display(), "asset created");
        Ok(id)
    }

    /// Create a task directory under `asset`
    pub fn create_task(&mut self, name: &str, asset: AssetId) -> Result<TaskId> {
        validate_name(name)?;
        let tree = self.project()?;
        let path = tree.asset(asset)?.path.join(name);

        if tree.find_task(asset, name).is_some() {
            tracing::warn!(path = %path.display(), "task node already exists, adding a duplicate");
        }

        fs::create_dir_all(&path)?;
        let id = self.project_mut()?.insert_task(asset, Task::new(&path))?;

        tracing::info!(path = %path.display(), "task created");
        self.refresh_selection()?;
        Ok(id)
    }

    /// Create one task per configured task template
    ///
    /// Templates the asset already has are skipped.
    pub fn create_template_tasks(&mut self, asset: AssetId) -> Result<Vec<TaskId>> {
        let templates = self.settings.get_string_list(SettingsEntry::TaskTemplates);
        let mut created = Vec::new();

        for name in templates {
            if self.project()?.find_task(asset, &name).is_some() {
                continue;
            }
            created.push(self.create_task(&name, asset)?);
        }

        Ok(created)
    }

    /// Delete a node's directory and detach it from its parent
    ///
    /// Already-absent directories are a soft miss: logged, nothing changes.
    /// Nodes without a reachable parent are only removed from disk. Ids from a
    /// tree retired by a reload still delete their directory; the matching
    /// node of the current tree, if any, is detached.
    pub fn delete_node<N: Into<NodeRef>>(&mut self, node: N) -> Result<()> {
        let node = node.into();
        let tree = self.project()?;
        let owner = self.tree_of(node)?;
        let path = owner.node_path(node)?.to_path_buf();

        if path == tree.root_path() {
            return Err(ConduitError::InvalidOperation(
                "Refusing to delete the project root".to_string(),
            ));
        }

        if !path.exists() {
            tracing::warn!(path = %path.display(), "nothing to delete, path already gone");
            return Ok(());
        }

        let current = if node.generation() == tree.generation() {
            Some(node)
        } else {
            tracing::debug!(path = %path.display(), "deleting through a stale handle");
            tree.node_at(node.kind(), &path)
        };

        fs::remove_dir_all(&path)?;
        tracing::info!(path = %path.display(), kind = %node.kind(), "deleted");

        let tree = self.project_mut()?;
        let detached = match current {
            Some(node) => tree.detach(node)?,
            None => false,
        };
        if !detached {
            tracing::debug!(path = %path.display(), "deleted node had no parent in the tree");
        }

        self.refresh_selection()?;
        Ok(())
    }

    // Current or retired tree that issued `node`
    fn tree_of(&self, node: NodeRef) -> Result<&ProjectTree> {
        let tree = self.project()?;
        if node.generation() == tree.generation() {
            return Ok(tree);
        }
        self.retired
            .iter()
            .find(|old| old.generation() == node.generation())
            .ok_or_else(|| ConduitError::StaleNode(format!("{} from an unknown tree", node.kind())))
    }

    // Republish the selection records, dropping nodes no longer in the tree
    fn refresh_selection(&mut self) -> Result<()> {
        let tree = self.project()?;
        let asset = self
            .selected_asset
            .filter(|id| tree.is_reachable(NodeRef::Asset(*id)));
        let task = self
            .selected_task
            .filter(|id| tree.is_reachable(NodeRef::Task(*id)));

        self.set_selected_asset(asset);
        self.set_selected_task(task);
        Ok(())
    }

    /// Every asset under `folder` (the root when `None`), pre-order
    pub fn get_all_assets(&self, folder: Option<FolderId>) -> Result<Vec<AssetId>> {
        let tree = self.project()?;
        tree.all_assets(folder.unwrap_or_else(|| tree.root()))
    }

    /// Subfolders of the folder at `parent_path` (the root when `None`)
    pub fn get_folders(&self, parent_path: Option<&Path>) -> Result<Vec<FolderId>> {
        Ok(self.project()?.folders(parent_path))
    }

    pub fn folder(&self, id: FolderId) -> Result<&Folder> {
        self.project()?.folder(id)
    }

    pub fn asset(&self, id: AssetId) -> Result<&Asset> {
        self.project()?.asset(id)
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.project()?.task(id)
    }

    pub fn set_selected_asset(&mut self, asset: Option<AssetId>) {
        self.selected_asset = asset;
        let record = asset.and_then(|id| self.asset_record(id).ok());
        self.selection.publish_asset(record);
    }

    pub fn set_selected_task(&mut self, task: Option<TaskId>) {
        self.selected_task = task;
        let record = task.and_then(|id| self.task_record(id).ok());
        self.selection.publish_task(record);
    }

    pub fn selected_asset(&self) -> Option<AssetId> {
        self.selected_asset
    }

    pub fn selected_task(&self) -> Option<TaskId> {
        self.selected_task
    }

    /// Read handle for threads that only need the current selection
    pub fn selection_handle(&self) -> SelectionHandle {
        self.selection.clone()
    }

    pub fn asset_record(&self, id: AssetId) -> Result<AssetRecord> {
        self.project()?.asset_record(id)
    }

    pub fn task_record(&self, id: TaskId) -> Result<TaskRecord> {
        self.project()?.task_record(id)
    }

    /// Next version string for a task
    pub fn next_version(&self, task: TaskId) -> Result<String> {
        self.pattern.next_version(&self.task(task)?.path)
    }

    /// Deliverable files in a task
    pub fn task_files(&self, task: TaskId) -> Result<Vec<PathBuf>> {
        versioning::list_deliverables(&self.task(task)?.path)
    }

    /// Copy `source` into a task as its next version
    ///
    /// Uses the selected task when `task` is `None`. With no task at all this
    /// logs a warning and returns `Ok(None)`.
    pub fn ingest_file<P: AsRef<Path>>(
        &self,
        source: P,
        task: Option<TaskId>,
        comment: Option<&str>,
    ) -> Result<Option<IngestedVersion>> {
        let tree = self.project()?;
        let Some(task_id) = task.or(self.selected_task) else {
            tracing::warn!("no task selected, nothing ingested");
            return Ok(None);
        };

        let task = tree.task(task_id)?;
        let asset_name = match tree.task_owner(task_id) {
            Some(owner) => tree.asset(owner)?.name.clone(),
            None => task
                .path
                .parent()
                .map(dir_name)
                .unwrap_or_default(),
        };
        let user = self.settings.username();

        let ingested = versioning::ingest(
            &self.pattern,
            &IngestRequest {
                source: source.as_ref(),
                asset_name: &asset_name,
                task_name: &task.name,
                task_dir: &task.path,
                user: &user,
                comment,
            },
        )?;
        Ok(Some(ingested))
    }

    /// Assets whose name fuzzy-matches `query`, best match first
    pub fn search_assets(&self, query: &str) -> Result<Vec<(AssetId, i64)>> {
        let tree = self.project()?;
        let mut results = Vec::new();

        for id in tree.all_assets(tree.root())? {
            let asset = tree.asset(id)?;
            if let Some(score) = self.matcher.fuzzy_match(&asset.name, query) {
                results.push((id, score));
            }
        }

        // Stable sort keeps tree order between equal scores
        results.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(results)
    }
}

// Names become single directory components
fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConduitError::InvalidOperation("Name cannot be empty".to_string()));
    }
    if trimmed == "." || trimmed == ".." || name.contains(['/', '\\']) {
        return Err(ConduitError::InvalidOperation(format!(
            "'{}' is not a valid name",
            name
        )));
    }
    Ok(())
}
