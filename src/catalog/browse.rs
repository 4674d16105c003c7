use std::collections::HashSet;
use std::str::FromStr;

use futures::stream::{self, StreamExt};

use super::client::CatalogClient;
use super::genres::{all_genres, find_genre};
use super::pager::{MergeOutcome, Pager};
use super::types::{Genre, GenreId, MovieId, QueryContext};

const ROW_CONCURRENCY: usize = 6;

/// One horizontally scrolling row of the browse screen.
pub struct GenreRow {
    pub genre: Genre,
    pub pager: Pager,
}

/// Names one row of the browse screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSelector {
    Popular,
    Genre(GenreId),
}

impl FromStr for RowSelector {
    type Err = String;

    /// `popular`, or a genre name or id from the static genre list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("popular") {
            return Ok(Self::Popular);
        }
        find_genre(s)
            .map(|genre| Self::Genre(genre.id))
            .ok_or_else(|| format!("unknown row '{}'", s.trim()))
    }
}

/// The browse screen: a popular row plus one row per genre, each paging
/// independently.
pub struct BrowseRows {
    popular: Pager,
    rows: Vec<GenreRow>,
}

impl BrowseRows {
    pub fn new(genres: Vec<Genre>) -> Self {
        let rows = genres
            .into_iter()
            .map(|genre| GenreRow {
                pager: Pager::new(QueryContext::Genre(genre.id)),
                genre,
            })
            .collect();
        Self {
            popular: Pager::new(QueryContext::Popular),
            rows,
        }
    }

    /// Rows for the full static genre list.
    pub fn with_all_genres() -> Self {
        Self::new(all_genres())
    }

    pub fn popular(&self) -> &Pager {
        &self.popular
    }

    pub fn rows(&self) -> &[GenreRow] {
        &self.rows
    }

    pub fn row(&self, genre: GenreId) -> Option<&GenreRow> {
        self.rows.iter().find(|row| row.genre.id == genre)
    }

    /// Load the first page of every row that has nothing yet. A failing row
    /// does not affect the others.
    pub async fn load_initial(&mut self, client: &CatalogClient, excluded: &HashSet<MovieId>) {
        let Self { popular, rows } = self;
        let popular = async {
            if popular.movies().is_empty() {
                popular.load_next(client, excluded).await;
            }
        };
        let rows = stream::iter(rows.iter_mut())
            .filter(|row| futures::future::ready(row.pager.movies().is_empty()))
            .map(|row| row.pager.load_next(client, excluded))
            .buffer_unordered(ROW_CONCURRENCY)
            .collect::<Vec<MergeOutcome>>();

        let ((), outcomes) = tokio::join!(popular, rows);
        let failed = outcomes
            .iter()
            .filter(|o| **o == MergeOutcome::Failed)
            .count();
        tracing::debug!(rows = outcomes.len(), failed, "Browse rows loaded");
    }

    /// Load the next page of the popular row.
    pub async fn load_more_popular(
        &mut self,
        client: &CatalogClient,
        excluded: &HashSet<MovieId>,
    ) -> MergeOutcome {
        self.popular.load_next(client, excluded).await
    }

    /// Load the next page of the selected row.
    pub async fn load_more_row(
        &mut self,
        row: RowSelector,
        client: &CatalogClient,
        excluded: &HashSet<MovieId>,
    ) -> MergeOutcome {
        match row {
            RowSelector::Popular => self.load_more_popular(client, excluded).await,
            RowSelector::Genre(genre) => self.load_more(genre, client, excluded).await,
        }
    }

    /// Load the next page of one genre row.
    pub async fn load_more(
        &mut self,
        genre: GenreId,
        client: &CatalogClient,
        excluded: &HashSet<MovieId>,
    ) -> MergeOutcome {
        match self.rows.iter_mut().find(|row| row.genre.id == genre) {
            Some(row) => row.pager.load_next(client, excluded).await,
            None => {
                tracing::debug!(genre, "No browse row for genre");
                MergeOutcome::Idle
            }
        }
    }
}
