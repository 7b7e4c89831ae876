//! Core abstractions for packlock.
//!
//! This crate provides the canonical model and the shared plumbing used by
//! every provider adapter and by the resolver.
//!
//! # Architecture
//!
//! packlock-core defines:
//! - **Model**: `Project`, `ProjectFile`, `Provider`, `ProjectType`, `ReleaseType`
//! - **Traits**: `Platform`, implemented once per content host
//! - **Filtering**: identifier classification and the file compatibility filter
//! - **Transport**: a pooled `HttpClient` shared by all adapters
//! - **Query Cache**: session-scoped memoization with request coalescing
//! - **Lock State**: the persisted project set and resolution context
//! - **Error Types**: unified error handling across providers
//!
//! # Examples
//!
//! Implementing a platform for a new host:
//!
//! ```no_run
//! use async_trait::async_trait;
//! use packlock_core::{Platform, Project, ProjectFile, Provider, Result};
//!
//! struct MyHost;
//!
//! #[async_trait]
//! impl Platform for MyHost {
//!     fn provider(&self) -> Provider {
//!         Provider::Modrinth
//!     }
//!
//!     async fn lookup_by_id(&self, _id: &str) -> Result<Option<Project>> {
//!         Ok(None)
//!     }
//!
//!     async fn lookup_by_slug(&self, _slug: &str) -> Result<Option<Project>> {
//!         Ok(None)
//!     }
//!
//!     async fn lookup_many(&self, _ids: &[String]) -> Result<Vec<Project>> {
//!         Ok(vec![])
//!     }
//!
//!     async fn list_files(
//!         &self,
//!         _target_versions: &[String],
//!         _target_loaders: &[String],
//!         _project_id: &str,
//!         _file_id: Option<&str>,
//!     ) -> Result<Vec<ProjectFile>> {
//!         Ok(vec![])
//!     }
//!
//!     async fn list_files_many(&self, _file_ids: &[String]) -> Result<Vec<ProjectFile>> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod lockfile;
pub mod model;
pub mod platform;

// Re-export commonly used types
pub use cache::{CachedPlatform, QueryCache};
pub use error::{PacklockError, Result};
pub use http::HttpClient;
pub use lockfile::{LOCK_FILE_NAME, LockState};
pub use model::{Project, ProjectFile, ProjectRef, ProjectType, Provider, ReleaseType};
pub use platform::{
    InputKind, PASS_THROUGH_LOADERS, Platform, classify_input, is_compatible, skip_unrecognized,
};
