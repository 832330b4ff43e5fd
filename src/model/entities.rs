/// Project entities
///
/// Folders, assets and tasks live in a `ProjectTree` arena and refer to each
/// other through small copyable ids. Each id carries the generation of the
/// tree that issued it, so handles kept across a reload are detected as stale.

use std::path::{Path, PathBuf};

/// Suffix of the marker file that turns a directory into an asset
pub const SIDECAR_SUFFIX: &str = ".sidecar";

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            pub(crate) generation: u64,
            pub(crate) index: usize,
        }

        impl $name {
            pub(crate) fn new(generation: u64, index: usize) -> Self {
                Self { generation, index }
            }
        }
    };
}

node_id!(FolderId);
node_id!(AssetId);
node_id!(TaskId);

/// Kind-tagged reference to any node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Folder(FolderId),
    Asset(AssetId),
    Task(TaskId),
}

impl NodeRef {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Folder(_) => NodeKind::Folder,
            NodeRef::Asset(_) => NodeKind::Asset,
            NodeRef::Task(_) => NodeKind::Task,
        }
    }

    /// Generation of the tree that issued this reference
    pub fn generation(&self) -> u64 {
        match self {
            NodeRef::Folder(id) => id.generation,
            NodeRef::Asset(id) => id.generation,
            NodeRef::Task(id) => id.generation,
        }
    }
}

impl From<FolderId> for NodeRef {
    fn from(id: FolderId) -> Self {
        NodeRef::Folder(id)
    }
}

impl From<AssetId> for NodeRef {
    fn from(id: AssetId) -> Self {
        NodeRef::Asset(id)
    }
}

impl From<TaskId> for NodeRef {
    fn from(id: TaskId) -> Self {
        NodeRef::Task(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Asset,
    Task,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeKind::Folder => "folder",
            NodeKind::Asset => "asset",
            NodeKind::Task => "task",
        };
        write!(f, "{}", s)
    }
}

/// Parent of a node: folders own folders and assets, assets own tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Folder(FolderId),
    Asset(AssetId),
}

/// Plain organizational directory
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub path: PathBuf,
    pub subfolders: Vec<FolderId>,
    pub assets: Vec<AssetId>,
}

impl Folder {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            subfolders: Vec::new(),
            assets: Vec::new(),
        }
    }

    /// Directory name, or the full path for a root like `/`
    pub fn name(&self) -> String {
        dir_name(&self.path)
    }
}

/// Directory identified by a sidecar marker
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub name: String,
    pub path: PathBuf,
    pub tasks: Vec<TaskId>,
}

impl Asset {
    /// Asset `name` inside `folder_path`
    pub fn new(folder_path: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: folder_path.join(name),
            tasks: Vec::new(),
        }
    }

    /// Asset backed by an existing directory, keeping its exact path
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        Self {
            name: dir_name(&path),
            path,
            tasks: Vec::new(),
        }
    }

    /// `<path>/<name>.sidecar`
    pub fn sidecar_path(&self) -> PathBuf {
        self.path.join(format!("{}{}", self.name, SIDECAR_SUFFIX))
    }
}

/// Work directory directly under an asset
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub path: PathBuf,
}

impl Task {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        Self {
            name: dir_name(&path),
            path,
        }
    }
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
