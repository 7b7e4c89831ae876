//! Modrinth support for packlock.
//!
//! Maps the Modrinth v2 API (projects and version records) onto the canonical
//! model and applies the file compatibility filter.

pub mod platform;
pub mod types;

pub use platform::{ModrinthPlatform, project_url};
pub use types::{MrDependency, MrProject, MrVersion, MrVersionFile};
