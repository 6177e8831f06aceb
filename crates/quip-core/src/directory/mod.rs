//! Cached read layer over workspace entities.

pub mod table;
pub mod workspace;

pub use table::{CachedRemoteTable, RefreshPolicy};
pub use workspace::{DirectoryOptions, WorkspaceDirectory};
