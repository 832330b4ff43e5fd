/// Project data model
///
/// Entities, their serialized records, and the tree that holds them.

pub mod entities;
pub mod records;
pub mod tree;

pub use entities::{
    Asset, AssetId, Folder, FolderId, NodeKind, NodeRef, Parent, Task, TaskId, SIDECAR_SUFFIX,
};
pub use records::{AssetRecord, TaskRecord};
pub use tree::ProjectTree;
