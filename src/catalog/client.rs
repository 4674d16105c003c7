use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use lru::LruCache;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::types::{Movie, MovieId, MoviePage, QueryContext, RawMovie, RawPage};

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB
const DETAIL_CACHE_CAPACITY: usize = 256;
const DETAIL_CONCURRENCY: usize = 8;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Errors from a single catalog request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body was not the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 2MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),
    #[error("Insecure catalog URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

/// HTTP client for the movie catalog.
///
/// Cheap to clone; clones share the HTTP connection pool and the detail cache.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Arc<SecretString>,
    language: String,
    details: Arc<Mutex<LruCache<MovieId, Movie>>>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("language", &self.language)
            .finish()
    }
}

impl CatalogClient {
    /// Build a client against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if `base_url` cannot carry path
    /// segments, and `FetchError::InsecureBaseUrl` for plain HTTP to anything
    /// but localhost.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: SecretString,
        language: &str,
    ) -> Result<Self, FetchError> {
        let base_url = parse_base_url(base_url)?;
        let capacity = NonZeroUsize::new(DETAIL_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            http,
            base_url,
            api_key: Arc::new(api_key),
            language: language.to_string(),
            details: Arc::new(Mutex::new(LruCache::new(capacity))),
        })
    }

    /// Fetch one page of results for `context` (pages start at 1).
    pub async fn fetch_page(
        &self,
        context: &QueryContext,
        page: u32,
    ) -> Result<MoviePage, FetchError> {
        let page_param = page.to_string();
        let url = match context {
            QueryContext::Popular => self.endpoint(
                &["discover", "movie"],
                &[("sort_by", "popularity.desc"), ("page", &page_param)],
            )?,
            QueryContext::Genre(genre) => {
                let genre = genre.to_string();
                self.endpoint(
                    &["discover", "movie"],
                    &[
                        ("with_genres", &genre),
                        ("sort_by", "popularity.desc"),
                        ("page", &page_param),
                    ],
                )?
            }
            QueryContext::Search(text) => self.endpoint(
                &["search", "movie"],
                &[("query", text), ("page", &page_param)],
            )?,
        };

        let raw: RawPage = self.get_json(url).await?;
        let page = raw.into_page(page);
        tracing::debug!(
            context = %context,
            page = page.page,
            total_pages = page.total_pages,
            count = page.movies.len(),
            "Fetched catalog page"
        );
        Ok(page)
    }

    /// Full details for one movie. Served from the detail cache when present.
    pub async fn movie_details(&self, id: MovieId) -> Result<Movie, FetchError> {
        if let Some(movie) = self.cached_details(id) {
            tracing::trace!(movie_id = id, "Detail cache hit");
            return Ok(movie);
        }

        let id_segment = id.to_string();
        let url = self.endpoint(&["movie", &id_segment], &[])?;
        let raw: RawMovie = self.get_json(url).await?;
        let movie = raw.into_movie();

        if let Ok(mut cache) = self.details.lock() {
            cache.put(id, movie.clone());
        }
        Ok(movie)
    }

    /// Movies similar to `id`.
    pub async fn similar(&self, id: MovieId, page: u32) -> Result<MoviePage, FetchError> {
        self.related(id, "similar", page).await
    }

    /// The catalog's own recommendations for `id`.
    pub async fn recommendations(&self, id: MovieId, page: u32) -> Result<MoviePage, FetchError> {
        self.related(id, "recommendations", page).await
    }

    /// Details for every id, in input order. Ids whose fetch failed are
    /// skipped.
    pub async fn details_for(&self, ids: &[MovieId]) -> Vec<Movie> {
        let results: Vec<(MovieId, Result<Movie, FetchError>)> = stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.movie_details(id).await) })
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(movie) => Some(movie),
                Err(e) => {
                    tracing::warn!(movie_id = id, error = %e, "Skipping movie whose details failed to load");
                    None
                }
            })
            .collect()
    }

    async fn related(&self, id: MovieId, kind: &str, page: u32) -> Result<MoviePage, FetchError> {
        let id_segment = id.to_string();
        let page_param = page.to_string();
        let url = self.endpoint(&["movie", &id_segment, kind], &[("page", &page_param)])?;
        let raw: RawPage = self.get_json(url).await?;
        Ok(raw.into_page(page))
    }

    fn cached_details(&self, id: MovieId) -> Option<Movie> {
        self.details.lock().ok()?.get(&id).cloned()
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", self.api_key.expose_secret());
            query.append_pair("language", &self.language);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        // Path only: the query string carries the API key
        let path = url.path().to_string();
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(path = %path, status, "Catalog request failed");
            return Err(FetchError::HttpStatus(status));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

fn parse_base_url(base: &str) -> Result<Url, FetchError> {
    let url = Url::parse(base).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "https" => {}
        "http" => {
            let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
            if !is_localhost {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS catalog URL (HTTPS required except for localhost)");
                return Err(FetchError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %base, "Using non-HTTPS catalog URL (localhost only)");
        }
        other => return Err(FetchError::InvalidUrl(format!("unsupported scheme: {}", other))),
    }

    if url.cannot_be_a_base() {
        return Err(FetchError::InvalidUrl(base.to_string()));
    }
    Ok(url)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
