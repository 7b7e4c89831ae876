//! Dependency resolution for packlock.
//!
//! Ties the provider adapters to a [`LockState`](packlock_core::LockState):
//! user requests are dispatched across providers in priority order, the
//! caller decides on each match through a [`Handler`], and required
//! dependencies are expanded until the closure is complete.

pub mod add;
pub mod cli;
pub mod config;
pub mod error;
pub mod prompt;
pub mod resolver;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use add::add_projects;
pub use config::PacklockConfig;
pub use error::{ResolveError, SkipReason};
pub use resolver::{
    AutoAccept, BatchReport, Candidate, Decision, ExactMatch, Handler, Miss, MissCause, Outcome,
    Recommender, Resolver,
};
