/// Project tree: scanning and lookups
///
/// Turns a root directory into a classified tree of folders, assets and tasks.
/// A directory holding a `*.sidecar` file at its own level is an asset; its
/// direct subdirectories are tasks. Everything else is a plain folder and is
/// scanned recursively.

use super::entities::{
    Asset, AssetId, Folder, FolderId, NodeKind, NodeRef, Parent, Task, TaskId, SIDECAR_SUFFIX,
};
use super::records::{AssetRecord, TaskRecord};
use crate::error::{ConduitError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

// Every tree gets its own generation so ids from an older tree never resolve
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// In-memory image of the project directory
#[derive(Debug)]
pub struct ProjectTree {
    generation: u64,
    root: FolderId,
    folders: Vec<Folder>,
    assets: Vec<Asset>,
    tasks: Vec<Task>,
}

impl ProjectTree {
    /// Scan `root` and build the full tree
    ///
    /// # Returns
    /// * `Ok(ProjectTree)` - The classified tree
    /// * `Err(ConduitError::ProjectRootNotFound)` - If `root` is not a directory
    /// * `Err(ConduitError::Io)` - If any directory cannot be read
    pub fn build<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ConduitError::ProjectRootNotFound(root.display().to_string()));
        }

        let mut tree = Self::empty(root);
        tree.scan_folder(tree.root)?;

        tracing::debug!(
            root = %root.display(),
            folders = tree.folders.len(),
            assets = tree.assets.len(),
            tasks = tree.tasks.len(),
            "project tree built"
        );
        Ok(tree)
    }

    fn empty(root: &Path) -> Self {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        Self {
            generation,
            root: FolderId::new(generation, 0),
            folders: vec![Folder::new(root)],
            assets: Vec::new(),
            tasks: Vec::new(),
        }
    }

    fn scan_folder(&mut self, id: FolderId) -> Result<()> {
        let folder_path = self.folder(id)?.path.clone();

        for entry in child_dirs(&folder_path)? {
            if Self::is_asset_dir(&entry)? {
                let asset_id = self.insert_asset(id, Asset::at(&entry))?;
                // Tasks are one level deep, never deeper
                for task_dir in child_dirs(&entry)? {
                    self.insert_task(asset_id, Task::new(task_dir))?;
                }
            } else {
                let child = self.insert_folder(id, Folder::new(entry))?;
                self.scan_folder(child)?;
            }
        }

        Ok(())
    }

    /// True if `path` holds a sidecar marker at its own level
    pub fn is_asset_dir<P: AsRef<Path>>(path: P) -> Result<bool> {
        for entry in fs::read_dir(path.as_ref())? {
            let entry = entry?;
            let is_marker = entry.file_name().to_string_lossy().ends_with(SIDECAR_SUFFIX);
            if is_marker && entry.path().is_file() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn root(&self) -> FolderId {
        self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.folders[self.root.index].path
    }

    fn ensure_current(&self, generation: u64, what: &str, index: usize) -> Result<()> {
        if generation != self.generation {
            return Err(ConduitError::StaleNode(format!("{} #{}", what, index)));
        }
        Ok(())
    }

    pub fn folder(&self, id: FolderId) -> Result<&Folder> {
        self.ensure_current(id.generation, "folder", id.index)?;
        self.folders
            .get(id.index)
            .ok_or_else(|| ConduitError::StaleNode(format!("folder #{}", id.index)))
    }

    pub fn asset(&self, id: AssetId) -> Result<&Asset> {
        self.ensure_current(id.generation, "asset", id.index)?;
        self.assets
            .get(id.index)
            .ok_or_else(|| ConduitError::StaleNode(format!("asset #{}", id.index)))
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.ensure_current(id.generation, "task", id.index)?;
        self.tasks
            .get(id.index)
            .ok_or_else(|| ConduitError::StaleNode(format!("task #{}", id.index)))
    }

    fn folder_mut(&mut self, id: FolderId) -> Result<&mut Folder> {
        self.ensure_current(id.generation, "folder", id.index)?;
        self.folders
            .get_mut(id.index)
            .ok_or_else(|| ConduitError::StaleNode(format!("folder #{}", id.index)))
    }

    fn asset_mut(&mut self, id: AssetId) -> Result<&mut Asset> {
        self.ensure_current(id.generation, "asset", id.index)?;
        self.assets
            .get_mut(id.index)
            .ok_or_else(|| ConduitError::StaleNode(format!("asset #{}", id.index)))
    }

    /// Backing directory of any node
    pub fn node_path(&self, node: NodeRef) -> Result<&Path> {
        Ok(match node {
            NodeRef::Folder(id) => &self.folder(id)?.path,
            NodeRef::Asset(id) => &self.asset(id)?.path,
            NodeRef::Task(id) => &self.task(id)?.path,
        })
    }

    /// Append a folder node to `parent.subfolders`
    pub(crate) fn insert_folder(&mut self, parent: FolderId, folder: Folder) -> Result<FolderId> {
        self.folder(parent)?;
        let id = FolderId::new(self.generation, self.folders.len());
        self.folders.push(folder);
        self.folder_mut(parent)?.subfolders.push(id);
        Ok(id)
    }

    /// Append an asset node to `parent.assets`
    pub(crate) fn insert_asset(&mut self, parent: FolderId, asset: Asset) -> Result<AssetId> {
        self.folder(parent)?;
        let id = AssetId::new(self.generation, self.assets.len());
        self.assets.push(asset);
        self.folder_mut(parent)?.assets.push(id);
        Ok(id)
    }

    /// Append a task node to `asset.tasks`
    pub(crate) fn insert_task(&mut self, asset: AssetId, task: Task) -> Result<TaskId> {
        self.asset(asset)?;
        let id = TaskId::new(self.generation, self.tasks.len());
        self.tasks.push(task);
        self.asset_mut(asset)?.tasks.push(id);
        Ok(id)
    }

    /// Remove `node` from the collection of its parent that matches its kind
    ///
    /// Returns false when the node has no reachable parent. The arena slot
    /// stays allocated, the node just becomes unreachable.
    pub(crate) fn detach(&mut self, node: NodeRef) -> Result<bool> {
        let detached = match (node, self.find_parent(node)) {
            (NodeRef::Folder(id), Some(Parent::Folder(parent))) => {
                let subfolders = &mut self.folder_mut(parent)?.subfolders;
                remove_first(subfolders, &id)
            }
            (NodeRef::Asset(id), Some(Parent::Folder(parent))) => {
                let assets = &mut self.folder_mut(parent)?.assets;
                remove_first(assets, &id)
            }
            (NodeRef::Task(id), Some(Parent::Asset(parent))) => {
                let tasks = &mut self.asset_mut(parent)?.tasks;
                remove_first(tasks, &id)
            }
            _ => false,
        };
        Ok(detached)
    }

    /// Folders reachable from `start`, pre-order, `start` included
    fn walk_folders(&self, start: FolderId) -> Vec<FolderId> {
        let mut order = Vec::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            let Ok(folder) = self.folder(id) else {
                continue;
            };
            order.push(id);
            // Reverse so the first child is visited first
            stack.extend(folder.subfolders.iter().rev().copied());
        }

        order
    }

    /// Find a plain folder (root included) by exact path
    pub fn find_folder<P: AsRef<Path>>(&self, path: P) -> Option<FolderId> {
        let path = path.as_ref();
        self.walk_folders(self.root)
            .into_iter()
            .find(|id| self.folders[id.index].path == path)
    }

    /// Find a reachable asset by exact path
    pub fn find_asset<P: AsRef<Path>>(&self, path: P) -> Option<AssetId> {
        let path = path.as_ref();
        self.all_assets(self.root)
            .ok()?
            .into_iter()
            .find(|id| self.assets[id.index].path == path)
    }

    /// Find a task of `asset` by name
    pub fn find_task(&self, asset: AssetId, name: &str) -> Option<TaskId> {
        let asset = self.asset(asset).ok()?;
        asset
            .tasks
            .iter()
            .copied()
            .find(|id| self.tasks[id.index].name == name)
    }

    /// Subfolders of the folder at `parent_path` (root when `None`)
    ///
    /// Empty when no folder has that path.
    pub fn folders(&self, parent_path: Option<&Path>) -> Vec<FolderId> {
        let parent = match parent_path {
            Some(path) => self.find_folder(path),
            None => Some(self.root),
        };

        parent
            .and_then(|id| self.folder(id).ok())
            .map(|folder| folder.subfolders.clone())
            .unwrap_or_default()
    }

    /// Every asset under `folder`, recursively, in pre-order
    pub fn all_assets(&self, folder: FolderId) -> Result<Vec<AssetId>> {
        self.folder(folder)?;
        let assets = self
            .walk_folders(folder)
            .into_iter()
            .flat_map(|id| self.folders[id.index].assets.iter().copied())
            .collect();
        Ok(assets)
    }

    /// Parent of `node`, searched from the root
    ///
    /// `None` for the root itself and for nodes no longer reachable.
    pub fn find_parent(&self, node: NodeRef) -> Option<Parent> {
        match node {
            NodeRef::Folder(id) => self
                .walk_folders(self.root)
                .into_iter()
                .find(|parent| self.folders[parent.index].subfolders.contains(&id))
                .map(Parent::Folder),
            NodeRef::Asset(id) => self
                .walk_folders(self.root)
                .into_iter()
                .find(|parent| self.folders[parent.index].assets.contains(&id))
                .map(Parent::Folder),
            NodeRef::Task(id) => self.task_owner(id).map(Parent::Asset),
        }
    }

    /// Asset that currently owns `task`
    pub fn task_owner(&self, task: TaskId) -> Option<AssetId> {
        self.all_assets(self.root)
            .ok()?
            .into_iter()
            .find(|asset| self.assets[asset.index].tasks.contains(&task))
    }

    /// True if `node` can be reached from the root
    pub fn is_reachable(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Folder(id) if id == self.root => true,
            _ => self.find_parent(node).is_some(),
        }
    }

    /// Reachable node of `kind` backed by `path`, if this tree has one
    pub fn node_at<P: AsRef<Path>>(&self, kind: NodeKind, path: P) -> Option<NodeRef> {
        let path = path.as_ref();
        match kind {
            NodeKind::Folder => self.find_folder(path).map(NodeRef::Folder),
            NodeKind::Asset => self.find_asset(path).map(NodeRef::Asset),
            NodeKind::Task => {
                let asset = self.find_asset(path.parent()?)?;
                let name = path.file_name()?.to_string_lossy();
                self.find_task(asset, &name).map(NodeRef::Task)
            }
        }
    }

    pub fn asset_record(&self, id: AssetId) -> Result<AssetRecord> {
        let asset = self.asset(id)?;
        let folder_path = match self.find_parent(NodeRef::Asset(id)) {
            Some(Parent::Folder(parent)) => self.folder(parent)?.path.clone(),
            _ => asset.path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let task_names = asset
            .tasks
            .iter()
            .map(|task| self.task(*task).map(|t| t.name.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(AssetRecord::new(asset, &folder_path, task_names))
    }

    pub fn task_record(&self, id: TaskId) -> Result<TaskRecord> {
        Ok(TaskRecord::from(self.task(id)?))
    }
}

// Direct subdirectories of `path`, sorted by name. Symlinks are never followed.
fn child_dirs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            tracing::debug!(path = %entry.path().display(), "skipping symlink");
            continue;
        }
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn remove_first<T: PartialEq>(items: &mut Vec<T>, target: &T) -> bool {
    match items.iter().position(|item| item == target) {
        Some(pos) => {
            items.remove(pos);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_asset(dir: &Path, tasks: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        fs::write(dir.join(format!("{}.sidecar", name)), "").unwrap();
        for task in tasks {
            fs::create_dir(dir.join(task)).unwrap();
        }
    }

    fn asset_names(tree: &ProjectTree, ids: &[AssetId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.asset(*id).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_build_tree_roundtrip() {
        let temp = TempDir::new().unwrap();
        make_asset(&temp.path().join("A").join("Char"), &["Modelling"]);

        let tree = ProjectTree::build(temp.path()).unwrap();
        let root = tree.folder(tree.root()).unwrap();

        assert_eq!(root.subfolders.len(), 1);
        assert!(root.assets.is_empty());

        let a = tree.folder(root.subfolders[0]).unwrap();
        assert_eq!(a.name(), "A");
        assert_eq!(a.assets.len(), 1);
        assert!(a.subfolders.is_empty());

        let char_asset = tree.asset(a.assets[0]).unwrap();
        assert_eq!(char_asset.name, "Char");
        assert_eq!(char_asset.tasks.len(), 1);
        assert_eq!(tree.task(char_asset.tasks[0]).unwrap().name, "Modelling");
    }

    #[test]
    fn test_marker_makes_asset_not_folder() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prop");
        fs::create_dir(&dir).unwrap();
        // Any *.sidecar name counts, not only <dir>.sidecar
        fs::write(dir.join("other.sidecar"), "").unwrap();

        let tree = ProjectTree::build(temp.path()).unwrap();
        let root = tree.folder(tree.root()).unwrap();

        assert!(root.subfolders.is_empty());
        assert_eq!(asset_names(&tree, &root.assets), vec!["prop"]);
    }

    #[test]
    fn test_marker_directory_is_not_a_marker() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("plain");
        fs::create_dir_all(dir.join("fake.sidecar")).unwrap();

        assert!(!ProjectTree::is_asset_dir(&dir).unwrap());
    }

    #[test]
    fn test_is_asset_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("folder");
        fs::create_dir(&dir).unwrap();
        assert!(!ProjectTree::is_asset_dir(&dir).unwrap());

        fs::write(dir.join("file.sidecar"), "").unwrap();
        assert!(ProjectTree::is_asset_dir(&dir).unwrap());
    }

    #[test]
    fn test_plain_folders_recurse_and_deeper_markers_ignored() {
        let temp = TempDir::new().unwrap();
        // Marker two levels down does not make "outer" an asset
        make_asset(&temp.path().join("outer").join("inner").join("Rock"), &[]);

        let tree = ProjectTree::build(temp.path()).unwrap();
        let outer = tree.find_folder(temp.path().join("outer")).unwrap();
        let inner = tree.find_folder(temp.path().join("outer").join("inner")).unwrap();

        assert!(tree.folder(outer).unwrap().assets.is_empty());
        assert_eq!(asset_names(&tree, &tree.folder(inner).unwrap().assets), vec!["Rock"]);
    }

    #[test]
    fn test_tasks_do_not_recurse() {
        let temp = TempDir::new().unwrap();
        let asset_dir = temp.path().join("Hero");
        make_asset(&asset_dir, &["Modelling"]);
        fs::create_dir_all(asset_dir.join("Modelling").join("wip")).unwrap();
        fs::write(asset_dir.join("notes.txt"), "x").unwrap();

        let tree = ProjectTree::build(temp.path()).unwrap();
        let hero = tree.find_asset(&asset_dir).unwrap();
        let tasks = &tree.asset(hero).unwrap().tasks;

        assert_eq!(tasks.len(), 1);
        assert_eq!(tree.task(tasks[0]).unwrap().name, "Modelling");
        // Nothing below an asset is treated as a folder
        assert!(tree.find_folder(asset_dir.join("Modelling")).is_none());
    }

    #[test]
    fn test_all_assets_preorder() {
        let temp = TempDir::new().unwrap();
        make_asset(&temp.path().join("b_shallow"), &[]);
        make_asset(&temp.path().join("a").join("b").join("c").join("deep"), &[]);
        make_asset(&temp.path().join("z").join("last"), &[]);

        let tree = ProjectTree::build(temp.path()).unwrap();
        let all = tree.all_assets(tree.root()).unwrap();

        // Root's own assets first, then subfolders in order
        assert_eq!(asset_names(&tree, &all), vec!["b_shallow", "deep", "last"]);
    }

    #[test]
    fn test_all_assets_from_subfolder() {
        let temp = TempDir::new().unwrap();
        make_asset(&temp.path().join("sub1").join("asset1"), &[]);
        make_asset(&temp.path().join("sub2").join("asset2"), &[]);

        let tree = ProjectTree::build(temp.path()).unwrap();
        let sub2 = tree.find_folder(temp.path().join("sub2")).unwrap();

        assert_eq!(asset_names(&tree, &tree.all_assets(sub2).unwrap()), vec!["asset2"]);
    }

    #[test]
    fn test_find_parent() {
        let temp = TempDir::new().unwrap();
        make_asset(&temp.path().join("chars").join("Hero"), &["Rig"]);

        let tree = ProjectTree::build(temp.path()).unwrap();
        let chars = tree.find_folder(temp.path().join("chars")).unwrap();
        let hero = tree.find_asset(temp.path().join("chars").join("Hero")).unwrap();
        let rig = tree.find_task(hero, "Rig").unwrap();

        assert_eq!(tree.find_parent(NodeRef::Folder(tree.root())), None);
        assert_eq!(
            tree.find_parent(NodeRef::Folder(chars)),
            Some(Parent::Folder(tree.root()))
        );
        assert_eq!(tree.find_parent(NodeRef::Asset(hero)), Some(Parent::Folder(chars)));
        assert_eq!(tree.find_parent(NodeRef::Task(rig)), Some(Parent::Asset(hero)));
    }

    #[test]
    fn test_folders_by_parent_path() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a").join("x")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();

        let tree = ProjectTree::build(temp.path()).unwrap();

        assert_eq!(tree.folders(None).len(), 2);
        let under_a = tree.folders(Some(&temp.path().join("a")));
        assert_eq!(tree.folder(under_a[0]).unwrap().name(), "x");
        assert!(tree.folders(Some(&temp.path().join("missing"))).is_empty());
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = ProjectTree::build(temp.path().join("nope"));
        assert!(matches!(result, Err(ConduitError::ProjectRootNotFound(_))));
    }

    #[test]
    fn test_ids_from_other_tree_are_stale() {
        let temp = TempDir::new().unwrap();
        make_asset(&temp.path().join("Hero"), &[]);

        let first = ProjectTree::build(temp.path()).unwrap();
        let hero = first.find_asset(temp.path().join("Hero")).unwrap();
        let second = ProjectTree::build(temp.path()).unwrap();

        assert_ne!(first.generation(), second.generation());
        assert!(matches!(second.asset(hero), Err(ConduitError::StaleNode(_))));
    }

    #[test]
    fn test_asset_record() {
        let temp = TempDir::new().unwrap();
        make_asset(&temp.path().join("chars").join("Hero"), &["Modelling", "Rigging"]);

        let tree = ProjectTree::build(temp.path()).unwrap();
        let hero = tree.find_asset(temp.path().join("chars").join("Hero")).unwrap();
        let record = tree.asset_record(hero).unwrap();

        assert_eq!(record.name, "Hero");
        assert_eq!(record.folder, temp.path().join("chars").display().to_string());
        assert_eq!(record.tasks, vec!["Modelling", "Rigging"]);
    }

    #[test]
    fn test_node_at_matches_kind_and_path() {
        let temp = TempDir::new().unwrap();
        let hero = temp.path().join("chars").join("Hero");
        fs::create_dir_all(hero.join("Rig")).unwrap();
        fs::write(hero.join("Hero.sidecar"), "").unwrap();

        let tree = ProjectTree::build(temp.path()).unwrap();
        let asset = tree.find_asset(&hero).unwrap();
        let task = tree.find_task(asset, "Rig").unwrap();

        assert_eq!(tree.node_at(NodeKind::Asset, &hero), Some(NodeRef::Asset(asset)));
        assert_eq!(tree.node_at(NodeKind::Task, hero.join("Rig")), Some(NodeRef::Task(task)));
        assert!(tree.node_at(NodeKind::Folder, &hero).is_none());
        assert!(tree.node_at(NodeKind::Task, hero.join("Anim")).is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_asset_keeps_real_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let asset_dir = temp.path().join(OsStr::from_bytes(b"caf\xe9"));
        fs::create_dir(&asset_dir).unwrap();
        fs::write(asset_dir.join("cafe.sidecar"), "").unwrap();

        let tree = ProjectTree::build(temp.path()).unwrap();
        let id = tree.find_asset(&asset_dir).unwrap();
        let asset = tree.asset(id).unwrap();

        assert_eq!(asset.path, asset_dir);
        assert!(asset.path.is_dir());
        assert_eq!(asset.name, "caf\u{fffd}");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_not_followed() {
        let temp = TempDir::new().unwrap();
        let loop_dir = temp.path().join("loop");
        fs::create_dir(&loop_dir).unwrap();
        std::os::unix::fs::symlink(temp.path(), loop_dir.join("back")).unwrap();

        let tree = ProjectTree::build(temp.path()).unwrap();
        let looped = tree.find_folder(&loop_dir).unwrap();
        assert!(tree.folder(looped).unwrap().subfolders.is_empty());
    }
}
