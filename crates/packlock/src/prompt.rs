//! Terminal prompts implementing the resolver's [`Handler`].

use crate::error::ResolveError;
use crate::resolver::{Candidate, Decision, Handler};
use async_trait::async_trait;
use dialoguer::{Confirm, Select};
use packlock_core::{Project, Provider};
use tokio::sync::Mutex;

/// Asks the user on the terminal.
///
/// Resolution branches run concurrently, so prompts are serialized: only one
/// question is on screen at a time. A prompt that cannot be shown (no TTY,
/// interrupted input) counts as "no".
#[derive(Debug, Default)]
pub struct TerminalHandler {
    prompt: Mutex<()>,
}

impl TerminalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    async fn confirm(&self, question: String, default: bool) -> bool {
        let _guard = self.prompt.lock().await;
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(question)
                .default(default)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::warn!("prompt failed: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("prompt task failed: {}", e);
                false
            }
        }
    }

    async fn select(&self, question: String, items: Vec<String>) -> Option<usize> {
        let _guard = self.prompt.lock().await;
        let answer = tokio::task::spawn_blocking(move || {
            Select::new()
                .with_prompt(question)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await;

        match answer {
            Ok(Ok(choice)) => choice,
            Ok(Err(e)) => {
                tracing::warn!("prompt failed: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("prompt task failed: {}", e);
                None
            }
        }
    }
}

/// Link to the project's page on `provider`, shown next to each question.
fn project_page(project: &Project, provider: Provider) -> Option<String> {
    let slug = project.slug_on(provider)?;
    Some(match provider {
        Provider::Modrinth => packlock_modrinth::project_url(project.project_type, slug),
        Provider::CurseForge => packlock_curseforge::project_url(project.project_type, slug),
    })
}

#[async_trait]
impl Handler for TerminalHandler {
    fn on_error(&self, _input: &str, error: &ResolveError) {
        eprintln!("error: {}", error);
    }

    async fn on_retry(
        &self,
        input: &str,
        previous: Provider,
        remaining: &[Provider],
    ) -> Option<Provider> {
        let mut items: Vec<String> = remaining
            .iter()
            .map(|p| format!("Try {}", p.display_name()))
            .collect();
        items.push("Skip".to_string());

        let question = format!(
            "'{}' is not available on {}",
            input,
            previous.display_name()
        );
        self.select(question, items)
            .await
            .and_then(|index| remaining.get(index).copied())
    }

    async fn on_success(&self, candidate: &Candidate) -> Decision {
        let slug = candidate.project.display_slug().to_string();
        let mut question = match &candidate.required_by {
            Some(parent) => format!(
                "Do you want to add {} ({}), required by {}?",
                slug, candidate.provider, parent
            ),
            None => format!("Do you want to add {} from {}?", slug, candidate.provider.display_name()),
        };
        if let Some(page) = project_page(&candidate.project, candidate.provider) {
            question.push_str(&format!(" <{}>", page));
        }
        if !self.confirm(question, candidate.recommended).await {
            return Decision::Reject;
        }

        if candidate.remaining.is_empty() || candidate.required_by.is_some() {
            return Decision::Accept;
        }
        let others: Vec<&str> = candidate
            .remaining
            .iter()
            .map(|p| p.display_name())
            .collect();
        let question = format!("Also add {} from {}?", slug, others.join(", "));
        if self.confirm(question, true).await {
            Decision::AcceptWithAlternates(candidate.remaining.clone())
        } else {
            Decision::Accept
        }
    }
}
