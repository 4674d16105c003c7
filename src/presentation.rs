//! Local filtering and sorting of already-fetched movies.
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::catalog::{GenreId, Movie, MovieId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenreFilter {
    #[default]
    All,
    Only(GenreId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    TitleAsc,
    TitleDesc,
    DateNewest,
    DateOldest,
    RatingHigh,
    RatingLow,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::TitleAsc,
        SortKey::TitleDesc,
        SortKey::DateNewest,
        SortKey::DateOldest,
        SortKey::RatingHigh,
        SortKey::RatingLow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::TitleAsc => "title-asc",
            SortKey::TitleDesc => "title-desc",
            SortKey::DateNewest => "date-newest",
            SortKey::DateOldest => "date-oldest",
            SortKey::RatingHigh => "rating-high",
            SortKey::RatingLow => "rating-low",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let valid: Vec<_> = SortKey::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown sort key '{}' (expected one of: {})", s, valid.join(", "))
            })
    }
}

/// User-controlled refinement of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub genre: GenreFilter,
    /// Inclusive lower bound, 0.0-10.0.
    pub min_rating: f64,
    pub sort: SortKey,
    /// Case-insensitive substring of title or overview. Blank matches all.
    pub query: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            genre: GenreFilter::All,
            min_rating: 0.0,
            sort: SortKey::TitleAsc,
            query: String::new(),
        }
    }
}

impl FilterState {
    pub fn matches(&self, movie: &Movie) -> bool {
        let genre_ok = match self.genre {
            GenreFilter::All => true,
            GenreFilter::Only(id) => movie.has_genre(id),
        };
        // An unknown rating only passes a zero threshold
        let rating_ok = match movie.rating {
            Some(rating) => rating >= self.min_rating,
            None => self.min_rating <= 0.0,
        };
        genre_ok && rating_ok && self.matches_query(movie)
    }

    fn matches_query(&self, movie: &Movie) -> bool {
        let query = self.query.trim();
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        movie.title.to_lowercase().contains(&needle)
            || movie.overview.to_lowercase().contains(&needle)
    }
}

/// Primary collation key: accents stripped, case folded.
fn title_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Base letters first, then accents and case, then the raw string.
fn compare_titles(a: &Movie, b: &Movie) -> Ordering {
    title_key(&a.title)
        .cmp(&title_key(&b.title))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
}

/// Missing values sort last regardless of direction.
fn compare_missing_last<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl FnOnce(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(&a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(key: SortKey, a: &Movie, b: &Movie) -> Ordering {
    match key {
        SortKey::TitleAsc => compare_titles(a, b),
        SortKey::TitleDesc => compare_titles(b, a),
        SortKey::DateNewest => compare_missing_last(a.released_on(), b.released_on(), |x, y| y.cmp(x)),
        SortKey::DateOldest => compare_missing_last(a.released_on(), b.released_on(), |x, y| x.cmp(y)),
        SortKey::RatingHigh => compare_missing_last(a.rating, b.rating, |x, y| y.total_cmp(x)),
        SortKey::RatingLow => compare_missing_last(a.rating, b.rating, |x, y| x.total_cmp(y)),
    }
}

/// Filter then stable-sort `movies`.
pub fn apply(movies: &[Movie], filters: &FilterState) -> Vec<Movie> {
    let mut view: Vec<Movie> = movies
        .iter()
        .filter(|m| filters.matches(m))
        .cloned()
        .collect();
    view.sort_by(|a, b| compare(filters.sort, a, b));
    view
}

/// Holds a list's inputs and its derived view, recomputed on every change.
///
/// The exclusion set is applied live, so movies flagged as not interested
/// disappear from already-fetched lists without a refetch.
#[derive(Debug, Default)]
pub struct ListController {
    source: Vec<Movie>,
    filters: FilterState,
    excluded: HashSet<MovieId>,
    view: Vec<Movie>,
}

impl ListController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &[Movie] {
        &self.view
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn set_movies(&mut self, movies: Vec<Movie>) {
        self.source = movies;
        self.recompute();
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.recompute();
    }

    pub fn set_genre(&mut self, genre: GenreFilter) {
        self.filters.genre = genre;
        self.recompute();
    }

    pub fn set_min_rating(&mut self, min_rating: f64) {
        self.filters.min_rating = min_rating.clamp(0.0, 10.0);
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.filters.sort = sort;
        self.recompute();
    }

    pub fn set_query(&mut self, query: &str) {
        self.filters.query = query.to_string();
        self.recompute();
    }

    pub fn set_excluded(&mut self, excluded: HashSet<MovieId>) {
        self.excluded = excluded;
        self.recompute();
    }

    /// Reset genre, rating and sort. The text query is kept.
    pub fn clear_filters(&mut self) {
        self.filters = FilterState {
            query: std::mem::take(&mut self.filters.query),
            ..FilterState::default()
        };
        self.recompute();
    }

    fn recompute(&mut self) {
        let visible: Vec<Movie> = self
            .source
            .iter()
            .filter(|m| !self.excluded.contains(&m.id))
            .cloned()
            .collect();
        self.view = apply(&visible, &self.filters);
    }
}
