//! Match ranking.

use packlock_core::{Project, Provider};

/// Decides whether a match can be offered as the recommended answer for a
/// request.
///
/// A recommended match is one the caller can accept without looking twice.
/// Anything else is ambiguous and needs explicit confirmation.
pub trait Recommender: Send + Sync {
    fn is_recommended(&self, input: &str, provider: Provider, project: &Project) -> bool;
}

/// Recommends a match when the request names it exactly and the provider
/// has files for the current context.
///
/// Slugs compare case-insensitively; ids compare exactly.
///
/// # Examples
///
/// ```
/// use packlock::{ExactMatch, Recommender};
/// use packlock_core::{Project, ProjectType, Provider};
///
/// let sodium = Project::new(Provider::Modrinth, ProjectType::Mod, "AANobbMI", "sodium", "Sodium");
///
/// // No files attached yet, so nothing is recommended.
/// assert!(!ExactMatch.is_recommended("sodium", Provider::Modrinth, &sodium));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Recommender for ExactMatch {
    fn is_recommended(&self, input: &str, provider: Provider, project: &Project) -> bool {
        let input = input.trim();
        let names_it = project.id_on(provider) == Some(input)
            || project
                .slug_on(provider)
                .is_some_and(|slug| slug.eq_ignore_ascii_case(input));
        names_it && project.has_files_on(provider)
    }
}
