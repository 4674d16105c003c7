//! Recommendations derived from the user's favorites.
//!
//! For every favorite the catalog is asked for the movie's title, its
//! "similar" list and its "recommendations" list. Similar lists become one
//! group per favorite; recommendation lists are merged into a single general
//! list.
use std::collections::HashSet;

use futures::stream::{self, StreamExt};

use crate::catalog::{CatalogClient, FetchError, Movie, MovieId, MoviePage};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Movies similar to one favorite.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationGroup {
    pub source_id: MovieId,
    pub source_title: String,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationBundle {
    /// One group per favorite, in favorites order. Empty groups are omitted.
    pub groups: Vec<RecommendationGroup>,
    /// Recommendations across all favorites, deduplicated by id.
    pub general: Vec<Movie>,
}

impl RecommendationBundle {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.general.is_empty()
    }

    /// The group for a source title, if one was created.
    pub fn group(&self, source_title: &str) -> Option<&RecommendationGroup> {
        self.groups.iter().find(|g| g.source_title == source_title)
    }
}

/// Everything fetched for one favorite. Each part fails independently.
struct SourceFetch {
    id: MovieId,
    details: Result<Movie, FetchError>,
    similar: Result<MoviePage, FetchError>,
    recommendations: Result<MoviePage, FetchError>,
}

async fn fetch_source(client: &CatalogClient, id: MovieId) -> SourceFetch {
    let (details, similar, recommendations) = tokio::join!(
        client.movie_details(id),
        client.similar(id, 1),
        client.recommendations(id, 1),
    );
    SourceFetch {
        id,
        details,
        similar,
        recommendations,
    }
}

/// Build the bundle for `favorites`, fetching with at most `concurrency`
/// favorites in flight.
pub async fn aggregate(
    client: &CatalogClient,
    favorites: &[MovieId],
    not_interested: &HashSet<MovieId>,
    concurrency: usize,
) -> RecommendationBundle {
    if favorites.is_empty() {
        return RecommendationBundle::default();
    }

    let fetched: Vec<SourceFetch> = stream::iter(favorites.iter().copied())
        .map(|id| fetch_source(client, id))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    fold_sources(fetched, favorites, not_interested)
}

/// Fold per-favorite results into a bundle. `fetched` is in favorites order.
fn fold_sources(
    fetched: Vec<SourceFetch>,
    favorites: &[MovieId],
    not_interested: &HashSet<MovieId>,
) -> RecommendationBundle {
    let favorite_set: HashSet<MovieId> = favorites.iter().copied().collect();
    let mut claimed: HashSet<MovieId> = HashSet::new();
    let mut general_seen: HashSet<MovieId> = HashSet::new();
    let mut bundle = RecommendationBundle::default();
    let mut failures = 0usize;

    for source in fetched {
        match (source.details, source.similar) {
            (Ok(details), Ok(similar)) => {
                let movies: Vec<Movie> = similar
                    .movies
                    .into_iter()
                    .filter(|m| !favorite_set.contains(&m.id))
                    .filter(|m| claimed.insert(m.id))
                    .collect();
                bundle.groups.push(RecommendationGroup {
                    source_id: source.id,
                    source_title: details.title,
                    movies,
                });
            }
            (Err(e), _) | (_, Err(e)) => {
                failures += 1;
                tracing::warn!(movie_id = source.id, error = %e, "Dropping recommendation group");
            }
        }

        match source.recommendations {
            Ok(page) => bundle.general.extend(
                page.movies
                    .into_iter()
                    .filter(|m| !favorite_set.contains(&m.id))
                    .filter(|m| general_seen.insert(m.id)),
            ),
            Err(e) => {
                failures += 1;
                tracing::warn!(movie_id = source.id, error = %e, "Skipping recommendations for favorite");
            }
        }
    }

    for group in &mut bundle.groups {
        group.movies.retain(|m| !not_interested.contains(&m.id));
    }
    bundle.groups.retain(|g| !g.movies.is_empty());
    bundle.general.retain(|m| !not_interested.contains(&m.id));

    tracing::debug!(
        favorites = favorites.len(),
        groups = bundle.groups.len(),
        general = bundle.general.len(),
        failures,
        "Recommendations aggregated"
    );
    bundle
}

/// Keeps the latest bundle and recomputes it only when favorites change.
pub struct Recommender {
    client: CatalogClient,
    concurrency: usize,
    computed_for: Option<Vec<MovieId>>,
    bundle: RecommendationBundle,
}

impl Recommender {
    pub fn new(client: CatalogClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency,
            computed_for: None,
            bundle: RecommendationBundle::default(),
        }
    }

    pub fn bundle(&self) -> &RecommendationBundle {
        &self.bundle
    }

    /// Recompute if `favorites` differs from the last computed snapshot.
    /// Returns true if a recomputation happened.
    pub async fn refresh(
        &mut self,
        favorites: &[MovieId],
        not_interested: &HashSet<MovieId>,
    ) -> bool {
        if self.computed_for.as_deref() == Some(favorites) {
            return false;
        }
        self.recompute(favorites, not_interested).await;
        true
    }

    /// Recompute unconditionally.
    pub async fn recompute(&mut self, favorites: &[MovieId], not_interested: &HashSet<MovieId>) {
        self.bundle = aggregate(&self.client, favorites, not_interested, self.concurrency).await;
        self.computed_for = Some(favorites.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn movie(id: MovieId) -> Movie {
        Movie {
            id,
            title: format!("Movie {}", id),
            poster_path: None,
            rating: None,
            overview: String::new(),
            release_date: None,
            genres: vec![],
        }
    }

    fn page(ids: &[MovieId]) -> MoviePage {
        MoviePage {
            page: 1,
            total_pages: 1,
            movies: ids.iter().copied().map(movie).collect(),
            has_more: false,
        }
    }

    fn source(id: MovieId, similar: &[MovieId], recommendations: &[MovieId]) -> SourceFetch {
        SourceFetch {
            id,
            details: Ok(movie(id)),
            similar: Ok(page(similar)),
            recommendations: Ok(page(recommendations)),
        }
    }

    fn group_ids(bundle: &RecommendationBundle, title: &str) -> Vec<MovieId> {
        bundle
            .group(title)
            .map(|g| g.movies.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_first_claim_wins() {
        let bundle = fold_sources(
            vec![source(1, &[10, 11], &[]), source(2, &[11, 12], &[])],
            &[1, 2],
            &HashSet::new(),
        );

        assert_eq!(group_ids(&bundle, "Movie 1"), vec![10, 11]);
        assert_eq!(group_ids(&bundle, "Movie 2"), vec![12]);
    }

    #[test]
    fn test_favorites_are_excluded_everywhere() {
        let bundle = fold_sources(
            vec![source(1, &[2, 10], &[2, 20]), source(2, &[1], &[1, 20, 21])],
            &[1, 2],
            &HashSet::new(),
        );

        assert_eq!(group_ids(&bundle, "Movie 1"), vec![10]);
        // Only favorites in the similar list: no group
        assert!(bundle.group("Movie 2").is_none());
        let general: Vec<_> = bundle.general.iter().map(|m| m.id).collect();
        assert_eq!(general, vec![20, 21]);
    }

    #[test]
    fn test_not_interested_filtered_after_grouping() {
        let bundle = fold_sources(
            vec![source(1, &[10, 11], &[30]), source(2, &[11, 12], &[31])],
            &[1, 2],
            &HashSet::from([11, 31]),
        );

        // 11 stays claimed by the first group even though it is then hidden
        assert_eq!(group_ids(&bundle, "Movie 1"), vec![10]);
        assert_eq!(group_ids(&bundle, "Movie 2"), vec![12]);
        let general: Vec<_> = bundle.general.iter().map(|m| m.id).collect();
        assert_eq!(general, vec![30]);
    }

    #[test]
    fn test_failures_are_isolated_per_favorite() {
        let broken_similar = SourceFetch {
            id: 1,
            details: Ok(movie(1)),
            similar: Err(FetchError::HttpStatus(500)),
            recommendations: Ok(page(&[40])),
        };
        let broken_recs = SourceFetch {
            id: 2,
            details: Ok(movie(2)),
            similar: Ok(page(&[12])),
            recommendations: Err(FetchError::HttpStatus(404)),
        };

        let bundle = fold_sources(vec![broken_similar, broken_recs], &[1, 2], &HashSet::new());

        assert!(bundle.group("Movie 1").is_none());
        assert_eq!(group_ids(&bundle, "Movie 2"), vec![12]);
        let general: Vec<_> = bundle.general.iter().map(|m| m.id).collect();
        assert_eq!(general, vec![40]);
    }

    #[test]
    fn test_group_order_follows_favorites() {
        let bundle = fold_sources(
            vec![source(5, &[50], &[]), source(3, &[30], &[]), source(4, &[40], &[])],
            &[5, 3, 4],
            &HashSet::new(),
        );
        let sources: Vec<_> = bundle.groups.iter().map(|g| g.source_id).collect();
        assert_eq!(sources, vec![5, 3, 4]);
    }
}
