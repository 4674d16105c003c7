use std::collections::HashSet;

use super::client::{CatalogClient, FetchError};
use super::slot::RequestSlot;
use super::types::{Movie, MovieId, MoviePage, QueryContext};

/// Identifies one page request made by a [`Pager`].
///
/// A ticket from an earlier context or generation is rejected on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub context: QueryContext,
    pub page: u32,
    generation: u64,
}

/// What happened when a page result was handed to the pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No request was made (already loading, or no more pages).
    Idle,
    Merged {
        page: u32,
        added: usize,
        duplicates: usize,
        excluded: usize,
    },
    /// The fetch failed; accumulated results are unchanged.
    Failed,
    /// The result belonged to a superseded context and was discarded.
    Stale,
    /// The in-flight request was aborted before it produced a result.
    Cancelled,
}

/// Counts from merging one page into an accumulator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub duplicates: usize,
    pub excluded: usize,
}

/// Append `incoming` to `acc`, skipping ids already seen or excluded.
///
/// The first occurrence of an id wins and is never overwritten.
pub fn merge_unique(
    acc: &mut Vec<Movie>,
    seen: &mut HashSet<MovieId>,
    incoming: Vec<Movie>,
    excluded: &HashSet<MovieId>,
) -> MergeStats {
    let mut stats = MergeStats::default();
    for movie in incoming {
        if excluded.contains(&movie.id) {
            stats.excluded += 1;
        } else if !seen.insert(movie.id) {
            stats.duplicates += 1;
        } else {
            acc.push(movie);
            stats.added += 1;
        }
    }
    stats
}

/// Accumulates paginated results for one query context.
///
/// At most one page is in flight at a time. Changing the context resets the
/// accumulator to page 1 and invalidates any outstanding request.
pub struct Pager {
    context: QueryContext,
    movies: Vec<Movie>,
    seen: HashSet<MovieId>,
    next_page: u32,
    has_more: bool,
    generation: u64,
    in_flight: Option<u32>,
    slot: RequestSlot<(PageTicket, Result<MoviePage, FetchError>)>,
}

impl Pager {
    pub fn new(context: QueryContext) -> Self {
        Self {
            context,
            movies: Vec::new(),
            seen: HashSet::new(),
            next_page: 1,
            has_more: true,
            generation: 0,
            in_flight: None,
            slot: RequestSlot::new(),
        }
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    /// Accumulated movies in merge order.
    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    /// Switch to `context`. Returns false (and keeps results) if unchanged.
    pub fn set_context(&mut self, context: QueryContext) -> bool {
        if context == self.context {
            return false;
        }
        tracing::debug!(from = %self.context, to = %context, "Query context changed");
        self.context = context;
        self.reset();
        true
    }

    /// Drop all results and start again from page 1 of the current context.
    pub fn reset(&mut self) {
        self.slot.cancel();
        self.movies.clear();
        self.seen.clear();
        self.next_page = 1;
        self.has_more = true;
        self.in_flight = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Abandon the in-flight request, keeping merged results. The same page
    /// is requested again by the next trigger.
    pub fn cancel(&mut self) {
        if self.in_flight.take().is_some() {
            tracing::debug!(context = %self.context, "Page request cancelled");
        }
        self.slot.cancel();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Infinite-scroll trigger: only the last rendered item requests more.
    pub fn on_item_visible(&mut self, index: usize, rendered_len: usize) -> Option<PageTicket> {
        if rendered_len == 0 || index + 1 != rendered_len {
            return None;
        }
        self.load_more()
    }

    /// Explicit "load more" trigger. Requests the next page unless one is
    /// already loading or the context is exhausted.
    pub fn load_more(&mut self) -> Option<PageTicket> {
        if !self.has_more {
            tracing::trace!(context = %self.context, "No more pages");
            return None;
        }
        self.request_page(self.next_page)
    }

    /// Request a specific page, even after `has_more` went false.
    pub fn request_page(&mut self, page: u32) -> Option<PageTicket> {
        if let Some(pending) = self.in_flight {
            tracing::trace!(context = %self.context, pending, "Page already loading, trigger ignored");
            return None;
        }
        self.in_flight = Some(page);
        Some(PageTicket {
            context: self.context.clone(),
            page,
            generation: self.generation,
        })
    }

    /// Hand the result of `ticket` to the pager.
    pub fn complete(
        &mut self,
        ticket: PageTicket,
        result: Result<MoviePage, FetchError>,
        excluded: &HashSet<MovieId>,
    ) -> MergeOutcome {
        if ticket.generation != self.generation || ticket.context != self.context {
            tracing::debug!(
                context = %ticket.context,
                page = ticket.page,
                "Ignoring stale page result (context changed)"
            );
            return MergeOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                let has_more = page.has_more;
                let stats = merge_unique(&mut self.movies, &mut self.seen, page.movies, excluded);
                self.next_page = ticket.page.saturating_add(1);
                self.has_more = has_more;
                tracing::debug!(
                    context = %self.context,
                    page = ticket.page,
                    added = stats.added,
                    duplicates = stats.duplicates,
                    excluded = stats.excluded,
                    has_more,
                    "Merged page"
                );
                MergeOutcome::Merged {
                    page: ticket.page,
                    added: stats.added,
                    duplicates: stats.duplicates,
                    excluded: stats.excluded,
                }
            }
            Err(e) => {
                tracing::warn!(context = %self.context, page = ticket.page, error = %e, "Page fetch failed");
                self.has_more = false;
                MergeOutcome::Failed
            }
        }
    }

    /// Fetch and merge the next page in place.
    pub async fn load_next(
        &mut self,
        client: &CatalogClient,
        excluded: &HashSet<MovieId>,
    ) -> MergeOutcome {
        match self.load_more() {
            Some(ticket) => {
                let result = client.fetch_page(&ticket.context, ticket.page).await;
                self.complete(ticket, result, excluded)
            }
            None => MergeOutcome::Idle,
        }
    }

    /// Run `ticket` as a background task. A later context change aborts it.
    pub fn spawn(&mut self, ticket: PageTicket, client: CatalogClient) {
        self.slot.issue(async move {
            let result = client.fetch_page(&ticket.context, ticket.page).await;
            (ticket, result)
        });
    }

    /// Wait for the spawned request and merge its result.
    pub async fn settle(&mut self, excluded: &HashSet<MovieId>) -> MergeOutcome {
        match self.slot.settle().await {
            Some((ticket, result)) => self.complete(ticket, result, excluded),
            None if self.in_flight.is_some() => {
                self.in_flight = None;
                MergeOutcome::Cancelled
            }
            None => MergeOutcome::Idle,
        }
    }
}
