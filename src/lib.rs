/// conduit library
///
/// Core of a production-pipeline project manager: classifies a project
/// directory into folders, assets and tasks, keeps that tree in sync with
/// disk through the facade, and files new deliverables as numbered versions.

pub mod error;
pub mod model;
pub mod project;
pub mod render;
pub mod settings;
pub mod versioning;

// Re-exports for convenience
pub use error::{ConduitError, Result};
pub use project::Conduit;
pub use settings::Settings;
