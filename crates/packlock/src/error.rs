use packlock_core::Provider;
use std::fmt;
use thiserror::Error;

/// Conditions reported to the caller when a request cannot be resolved.
///
/// These are per-request: a failed request never aborts the rest of the
/// batch. Fatal faults (bad lock context, unreadable config) are
/// [`packlock_core::PacklockError`]s instead.
///
/// # Examples
///
/// ```
/// use packlock::ResolveError;
///
/// let error = ResolveError::NotFound { input: "sodium".into() };
/// assert_eq!(error.to_string(), "no provider has a project matching 'sodium'");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no provider has a project matching '{input}'")]
    NotFound { input: String },

    #[error("'{input}' has no files for the target versions and loaders on {}", join(.providers))]
    NoFiles {
        input: String,
        providers: Vec<Provider>,
    },

    #[error("every provider failed for '{input}': {message}")]
    ProviderError { input: String, message: String },
}

impl ResolveError {
    /// The request this condition is about.
    pub fn input(&self) -> &str {
        match self {
            Self::NotFound { input } | Self::NoFiles { input, .. } | Self::ProviderError { input, .. } => {
                input
            }
        }
    }
}

fn join(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a matched project was not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The caller declined a recommended match.
    Declined,
    /// The match was ambiguous and the caller did not confirm it.
    AmbiguousNoConfirmation,
    /// The project is already in the lock.
    AlreadyAdded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Declined => "declined",
            Self::AmbiguousNoConfirmation => "ambiguous match not confirmed",
            Self::AlreadyAdded => "already added",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_files_lists_providers() {
        let error = ResolveError::NoFiles {
            input: "jei".into(),
            providers: vec![Provider::Modrinth, Provider::CurseForge],
        };
        assert_eq!(
            error.to_string(),
            "'jei' has no files for the target versions and loaders on Modrinth, CurseForge"
        );
        assert_eq!(error.input(), "jei");
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::AlreadyAdded.to_string(), "already added");
        assert_eq!(
            SkipReason::AmbiguousNoConfirmation.to_string(),
            "ambiguous match not confirmed"
        );
    }
}
