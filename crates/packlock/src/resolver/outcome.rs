use crate::error::{ResolveError, SkipReason};
use packlock_core::{ProjectRef, Provider};

/// Result of one resolution step for a request.
///
/// The request loop in [`Resolver`](super::Resolver) consumes `Retry` by
/// asking the handler for the next provider; every other variant is final and
/// ends up in the [`BatchReport`](super::BatchReport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The caller accepted the match; carries the provider/id it was found under.
    Accepted(ProjectRef),
    Skipped(SkipReason),
    /// The provider had no usable match.
    Retry(Miss),
    Failed(ResolveError),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// A provider that produced no usable match, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Miss {
    pub provider: Provider,
    pub cause: MissCause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissCause {
    NotFound,
    /// The project exists but has no file for the target context.
    NoFiles,
    /// Transport or payload fault.
    Fault(String),
}

/// Folds the misses of every attempted provider into the condition reported
/// for the request.
///
/// Faults on every attempt make a `ProviderError`; a project that exists
/// somewhere without usable files makes `NoFiles`; anything else is `NotFound`.
pub(crate) fn failure(input: &str, misses: &[Miss]) -> ResolveError {
    let faults: Vec<&str> = misses
        .iter()
        .filter_map(|m| match &m.cause {
            MissCause::Fault(message) => Some(message.as_str()),
            _ => None,
        })
        .collect();
    if !misses.is_empty() && faults.len() == misses.len() {
        return ResolveError::ProviderError {
            input: input.to_string(),
            message: faults.join("; "),
        };
    }

    let no_files: Vec<Provider> = misses
        .iter()
        .filter(|m| m.cause == MissCause::NoFiles)
        .map(|m| m.provider)
        .collect();
    if !no_files.is_empty() {
        return ResolveError::NoFiles {
            input: input.to_string(),
            providers: no_files,
        };
    }

    ResolveError::NotFound {
        input: input.to_string(),
    }
}

/// Final outcome of one top-level request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestReport {
    pub input: String,
    pub outcome: Outcome,
}

/// Final outcome of one dependency discovered during expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub dependency: ProjectRef,
    pub required_by: ProjectRef,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn miss(provider: Provider, cause: MissCause) -> Miss {
        Miss { provider, cause }
    }

    #[test]
    fn test_all_faults_is_provider_error() {
        let misses = [
            miss(Provider::Modrinth, MissCause::Fault("HTTP 500".into())),
            miss(Provider::CurseForge, MissCause::Fault("timeout".into())),
        ];
        assert_eq!(
            failure("jei", &misses),
            ResolveError::ProviderError {
                input: "jei".into(),
                message: "HTTP 500; timeout".into(),
            }
        );
    }

    #[test]
    fn test_fault_then_miss_is_not_found() {
        let misses = [
            miss(Provider::Modrinth, MissCause::Fault("HTTP 500".into())),
            miss(Provider::CurseForge, MissCause::NotFound),
        ];
        assert!(matches!(failure("jei", &misses), ResolveError::NotFound { .. }));
    }

    #[test]
    fn test_no_files_wins_over_not_found() {
        let misses = [
            miss(Provider::Modrinth, MissCause::NotFound),
            miss(Provider::CurseForge, MissCause::NoFiles),
        ];
        assert_eq!(
            failure("jei", &misses),
            ResolveError::NoFiles {
                input: "jei".into(),
                providers: vec![Provider::CurseForge],
            }
        );
    }
}
