use super::client::{CatalogClient, FetchError};
use super::slot::RequestSlot;
use super::types::{Movie, QueryContext};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 6;

/// Type-ahead search suggestions.
///
/// Each update supersedes the previous request; a blank query clears the
/// suggestions without touching the network.
pub struct Suggestions {
    client: CatalogClient,
    limit: usize,
    slot: RequestSlot<Result<Vec<Movie>, FetchError>>,
    results: Vec<Movie>,
}

impl Suggestions {
    pub fn new(client: CatalogClient, limit: usize) -> Self {
        Self {
            client,
            limit,
            slot: RequestSlot::new(),
            results: Vec::new(),
        }
    }

    /// Start fetching suggestions for `query`.
    pub fn update(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            self.slot.cancel();
            self.results.clear();
            return;
        }

        let client = self.client.clone();
        let context = QueryContext::Search(query.to_string());
        let limit = self.limit;
        self.slot.issue(async move {
            let page = client.fetch_page(&context, 1).await?;
            Ok::<Vec<Movie>, FetchError>(page.movies.into_iter().take(limit).collect())
        });
    }

    /// Wait for the latest request and return the current suggestions.
    ///
    /// A failed request leaves the previous suggestions in place.
    pub async fn settle(&mut self) -> &[Movie] {
        match self.slot.settle().await {
            Some(Ok(movies)) => self.results = movies,
            Some(Err(e)) => tracing::warn!(error = %e, "Suggestion request failed"),
            None => {}
        }
        &self.results
    }

    pub fn results(&self) -> &[Movie] {
        &self.results
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }
}
