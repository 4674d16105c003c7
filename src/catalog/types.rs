use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::genres::genre_name;

pub type MovieId = i64;
pub type GenreId = u32;

// ============================================================================
// Canonical Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

/// A catalog movie, normalized from whichever response shape carried it.
///
/// Value object: never mutated after creation, replaced wholesale on refetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub poster_path: Option<String>,
    /// Average vote, 0.0-10.0. `None` is shown as unknown.
    pub rating: Option<f64>,
    pub overview: String,
    /// Raw catalog release date (`YYYY-MM-DD`), absent when empty.
    pub release_date: Option<String>,
    pub genres: Vec<Genre>,
}

impl Movie {
    /// Parsed release date, if present and well formed.
    pub fn released_on(&self) -> Option<NaiveDate> {
        self.release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    }

    pub fn has_genre(&self, id: GenreId) -> bool {
        self.genres.iter().any(|g| g.id == id)
    }

    /// Full poster URL under `image_base` (e.g. `https://image.tmdb.org/t/p/w500`).
    pub fn poster_url(&self, image_base: &str) -> Option<String> {
        self.poster_path
            .as_deref()
            .map(|path| format!("{}{}", image_base.trim_end_matches('/'), path))
    }
}

// ============================================================================
// Query Context
// ============================================================================

/// The parameter set that scopes one pagination accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryContext {
    Popular,
    Genre(GenreId),
    Search(String),
}

impl QueryContext {
    /// Search for `text`, or the popular feed when `text` is blank.
    pub fn from_query(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            QueryContext::Popular
        } else {
            QueryContext::Search(trimmed.to_string())
        }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryContext::Popular => f.write_str("popular"),
            QueryContext::Genre(id) => match genre_name(*id) {
                Some(name) => write!(f, "genre:{}", name),
                None => write!(f, "genre:{}", id),
            },
            QueryContext::Search(text) => write!(f, "search:{}", text),
        }
    }
}

/// One page of normalized results.
#[derive(Debug, Clone, PartialEq)]
pub struct MoviePage {
    pub page: u32,
    pub total_pages: u32,
    pub movies: Vec<Movie>,
    /// True while `page < total_pages` and the page was not empty.
    pub has_more: bool,
}

// ============================================================================
// Wire Shapes
// ============================================================================

/// A movie as returned by list endpoints (`genre_ids`) or the detail
/// endpoint (`genres`).
#[derive(Debug, Deserialize)]
pub(crate) struct RawMovie {
    pub id: MovieId,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub genre_ids: Option<Vec<GenreId>>,
    pub genres: Option<Vec<Genre>>,
}

impl RawMovie {
    pub(crate) fn into_movie(self) -> Movie {
        let genres = match self.genres {
            Some(genres) if !genres.is_empty() => genres,
            _ => self
                .genre_ids
                .unwrap_or_default()
                .into_iter()
                .filter_map(|id| {
                    genre_name(id).map(|name| Genre {
                        id,
                        name: name.to_string(),
                    })
                })
                .collect(),
        };

        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .or(self.original_title)
            .unwrap_or_else(|| "Untitled".to_string());

        Movie {
            id: self.id,
            title,
            poster_path: self.poster_path.filter(|p| !p.is_empty()),
            rating: self.vote_average.filter(|v| v.is_finite()),
            overview: self.overview.unwrap_or_default(),
            release_date: self.release_date.filter(|d| !d.trim().is_empty()),
            genres,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<RawMovie>,
    #[serde(default)]
    pub total_pages: u32,
}

impl RawPage {
    pub(crate) fn into_page(self, requested: u32) -> MoviePage {
        let page = if self.page == 0 { requested } else { self.page };
        let has_more = !self.results.is_empty() && page < self.total_pages;
        MoviePage {
            page,
            total_pages: self.total_pages,
            movies: self.results.into_iter().map(RawMovie::into_movie).collect(),
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_shape_resolves_genre_ids() {
        let raw: RawMovie = serde_json::from_str(
            r#"{"id": 603, "title": "The Matrix", "poster_path": "/m.jpg",
                "vote_average": 8.2, "overview": "Neo.", "release_date": "1999-03-30",
                "genre_ids": [28, 878, 999999]}"#,
        )
        .unwrap();
        let movie = raw.into_movie();

        assert_eq!(movie.id, 603);
        assert_eq!(movie.rating, Some(8.2));
        let names: Vec<_> = movie.genres.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Action", "Science Fiction"]);
        assert_eq!(
            movie.released_on(),
            NaiveDate::from_ymd_opt(1999, 3, 30)
        );
    }

    #[test]
    fn test_detail_shape_keeps_genre_pairs() {
        let raw: RawMovie = serde_json::from_str(
            r#"{"id": 1, "title": "X", "genres": [{"id": 18, "name": "Drama"}]}"#,
        )
        .unwrap();
        let movie = raw.into_movie();
        assert_eq!(
            movie.genres,
            vec![Genre {
                id: 18,
                name: "Drama".into()
            }]
        );
    }

    #[test]
    fn test_missing_fields_normalize() {
        let raw: RawMovie = serde_json::from_str(
            r#"{"id": 2, "title": "", "original_title": "Orig", "overview": null,
                "release_date": "", "poster_path": null, "genre_ids": null}"#,
        )
        .unwrap();
        let movie = raw.into_movie();
        assert_eq!(movie.title, "Orig");
        assert_eq!(movie.overview, "");
        assert_eq!(movie.release_date, None);
        assert_eq!(movie.rating, None);
        assert!(movie.genres.is_empty());
    }

    #[test]
    fn test_page_has_more() {
        let raw: RawPage =
            serde_json::from_str(r#"{"page": 2, "results": [{"id": 1}], "total_pages": 3}"#)
                .unwrap();
        assert!(raw.into_page(2).has_more);

        let last: RawPage =
            serde_json::from_str(r#"{"page": 3, "results": [{"id": 1}], "total_pages": 3}"#)
                .unwrap();
        assert!(!last.into_page(3).has_more);

        let empty: RawPage =
            serde_json::from_str(r#"{"page": 1, "results": [], "total_pages": 9}"#).unwrap();
        assert!(!empty.into_page(1).has_more);
    }

    #[test]
    fn test_query_context_from_blank_query() {
        assert_eq!(QueryContext::from_query("  "), QueryContext::Popular);
        assert_eq!(
            QueryContext::from_query(" alien "),
            QueryContext::Search("alien".into())
        );
    }

    #[test]
    fn test_poster_url() {
        let movie = Movie {
            id: 1,
            title: "T".into(),
            poster_path: Some("/p.jpg".into()),
            rating: None,
            overview: String::new(),
            release_date: None,
            genres: vec![],
        };
        assert_eq!(
            movie.poster_url("https://image.tmdb.org/t/p/w500/").as_deref(),
            Some("https://image.tmdb.org/t/p/w500/p.jpg")
        );
    }
}
