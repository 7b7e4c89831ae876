//! CurseForge support for packlock.
//!
//! Maps the CurseForge v1 API (mods and mod files) onto the canonical model.
//! All requests carry the `x-api-key` header.

pub mod platform;
pub mod types;

pub use platform::{CurseForgePlatform, project_url};
pub use types::{CfFile, CfMod};
