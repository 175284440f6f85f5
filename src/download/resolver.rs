//! Query resolution: search the provider and pick one candidate.

use crate::core::error::{PipelineError, PipelineResult};
use crate::core::retry::{retry, RetryConfig};
use crate::core::types::MediaCandidate;
use crate::download::error::ProviderError;
use crate::download::source::MediaProvider;
use std::sync::Arc;
use std::time::Duration;

/// How many results to request and how to choose among them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub search_results: usize,
    /// Candidates strictly shorter than this are preferred
    pub duration_ceiling_secs: u64,
    /// When set, no candidate under the ceiling means `NotFound` instead of the first result
    pub reject_overlong: bool,
    pub search_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            search_results: 5,
            duration_ceiling_secs: 1200,
            reject_overlong: false,
            search_timeout: Duration::from_secs(30),
            retry: RetryConfig::with_attempts(2),
        }
    }
}

/// Turns a validated query into a single [`MediaCandidate`].
pub struct Resolver {
    provider: Arc<dyn MediaProvider>,
    settings: ResolverSettings,
}

impl Resolver {
    pub fn new(provider: Arc<dyn MediaProvider>, settings: ResolverSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// All candidates for a query, in provider order, with transient failures retried.
    pub async fn search(&self, query: &str) -> PipelineResult<Vec<MediaCandidate>> {
        let outcome = retry(&self.settings.retry, move || self.search_once(query)).await;
        if outcome.attempts > 1 {
            log::info!("Search for '{}' took {} attempts", query, outcome.attempts);
        }
        outcome.into_result().map_err(|e| search_error(query, e))
    }

    /// Searches and applies the selection policy.
    pub async fn resolve(&self, query: &str) -> PipelineResult<MediaCandidate> {
        let candidates = self.search(query).await?;
        log::debug!(
            "Search for '{}' via {} returned {} candidate(s)",
            query,
            self.provider.name(),
            candidates.len()
        );

        select_candidate(candidates, self.settings.duration_ceiling_secs, self.settings.reject_overlong).ok_or_else(
            || PipelineError::NotFound {
                query: query.to_string(),
            },
        )
    }

    async fn search_once(&self, query: &str) -> Result<Vec<MediaCandidate>, ProviderError> {
        let limit = self.settings.search_results;
        match tokio::time::timeout(self.settings.search_timeout, self.provider.search(query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "search did not finish within {}s",
                self.settings.search_timeout.as_secs()
            ))),
        }
    }
}

/// The selection policy.
///
/// Returns the first candidate whose known duration is strictly below
/// `ceiling_secs`. If none qualifies, the first candidate is returned
/// unless `reject_overlong` is set. A candidate with unknown duration is
/// never preferred, but can still be that fallback. Candidates without a
/// title or URL are ignored.
pub fn select_candidate(
    candidates: Vec<MediaCandidate>,
    ceiling_secs: u64,
    reject_overlong: bool,
) -> Option<MediaCandidate> {
    let mut usable: Vec<MediaCandidate> = candidates
        .into_iter()
        .filter(|c| !c.title.trim().is_empty() && !c.source_url.trim().is_empty())
        .collect();

    if let Some(pos) = usable
        .iter()
        .position(|c| c.duration_seconds.is_some_and(|d| d < ceiling_secs))
    {
        return Some(usable.swap_remove(pos));
    }

    if reject_overlong || usable.is_empty() {
        return None;
    }

    let first = usable.swap_remove(0);
    log::info!(
        "No candidate under {}s, falling back to first result {}",
        ceiling_secs,
        first.describe()
    );
    Some(first)
}

fn search_error(query: &str, err: ProviderError) -> PipelineError {
    match err {
        ProviderError::Unavailable(_) => PipelineError::NotFound {
            query: query.to_string(),
        },
        other => PipelineError::Resolver(other.to_string()),
    }
}
