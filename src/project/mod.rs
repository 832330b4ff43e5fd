/// Project facade
///
/// CRUD on folders, assets and tasks, version ingestion, and the current
/// selection shared with outside readers.

pub mod conduit;
pub mod selection;

pub use conduit::Conduit;
pub use selection::{SelectionHandle, SelectionSnapshot};
