//! Caller contract for driving a resolution.

use crate::error::ResolveError;
use async_trait::async_trait;
use packlock_core::{Project, ProjectRef, Provider};

/// A match offered to the caller for acceptance.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The normalized project with its compatible files attached.
    pub project: Project,
    /// Provider the match came from.
    pub provider: Provider,
    /// Whether the match is unambiguous. See [`Recommender`](super::Recommender).
    pub recommended: bool,
    /// Providers not yet tried for this request, in priority order.
    pub remaining: Vec<Provider>,
    /// Set when the candidate is a dependency of an already accepted project.
    pub required_by: Option<ProjectRef>,
}

/// The caller's answer to a [`Candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    /// Accept, and also fetch the same project from these providers so the
    /// lock carries every copy.
    AcceptWithAlternates(Vec<Provider>),
    Reject,
}

/// Decisions the resolver cannot make on its own.
///
/// Prompting, printing and any other user interaction live behind this
/// trait; the resolver only hands out plain data.
#[async_trait]
pub trait Handler: Send + Sync {
    /// A request or dependency could not be resolved.
    fn on_error(&self, input: &str, error: &ResolveError);

    /// `previous` had no usable match for `input`. Returns the provider to try
    /// next, or `None` to give up.
    async fn on_retry(&self, input: &str, previous: Provider, remaining: &[Provider])
    -> Option<Provider>;

    /// A match was found.
    async fn on_success(&self, candidate: &Candidate) -> Decision;
}

/// Non-interactive handler.
///
/// Accepts recommended matches, rejects ambiguous ones, and retries on the
/// next provider in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAccept;

#[async_trait]
impl Handler for AutoAccept {
    fn on_error(&self, input: &str, error: &ResolveError) {
        tracing::warn!("{}: {}", input, error);
    }

    async fn on_retry(
        &self,
        input: &str,
        previous: Provider,
        remaining: &[Provider],
    ) -> Option<Provider> {
        let next = remaining.first().copied();
        if let Some(next) = next {
            tracing::debug!("{} not usable on {}, trying {}", input, previous, next);
        }
        next
    }

    async fn on_success(&self, candidate: &Candidate) -> Decision {
        if candidate.recommended {
            Decision::Accept
        } else {
            tracing::info!(
                "skipping ambiguous match '{}' on {}",
                candidate.project.display_slug(),
                candidate.provider
            );
            Decision::Reject
        }
    }
}
