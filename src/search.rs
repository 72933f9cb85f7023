//! Brave Search client and result normalization.
//!
//! [`BraveSearchClient::invoke`] never fails: every validation, HTTP and
//! decoding problem comes back as [`SearchOutcome::Failure`] so the agent
//! can hand it to the model as ordinary data.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

pub const MIN_RESULTS: i64 = 1;
pub const MAX_RESULTS: i64 = 20;
pub const DEFAULT_MAX_RESULTS: i64 = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SCORE_STEP: f64 = 0.05;
const SCORE_FLOOR: f64 = 0.1;

/// One normalized web hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
    /// Synthetic relevance in `[0.1, 1.0]`, derived from rank only.
    pub score: f64,
}

/// Relevance score for a zero-based rank: starts at 1.0, drops 0.05 per
/// position, never below 0.1.
pub fn rank_score(rank: usize) -> f64 {
    (1.0 - rank as f64 * SCORE_STEP).max(SCORE_FLOOR)
}

/// Validated request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    query: String,
    max_results: u32,
}

impl SearchQuery {
    /// Trims the query and clamps `max_results` into `[1, 20]`.
    pub fn new(query: &str, max_results: i64) -> Result<Self, SearchFailure> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchFailure::empty_query());
        }

        Ok(Self {
            query: query.to_string(),
            max_results: max_results.clamp(MIN_RESULTS, MAX_RESULTS) as u32,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailureKind {
    EmptyQuery,
    MissingApiKey,
    RateLimited,
    Unauthorized,
    /// Any other non-200 status.
    Api,
    /// Connection failure, timeout, or a body that could not be read.
    Transport,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SearchFailure {
    pub kind: SearchFailureKind,
    pub message: String,
}

impl SearchFailure {
    pub fn new(kind: SearchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn empty_query() -> Self {
        Self::new(SearchFailureKind::EmptyQuery, "Query cannot be empty")
    }

    fn missing_api_key() -> Self {
        Self::new(SearchFailureKind::MissingApiKey, "Brave API key is required")
    }

    fn rate_limited() -> Self {
        Self::new(
            SearchFailureKind::RateLimited,
            "Rate limit exceeded. Check your Brave API quota.",
        )
    }

    fn unauthorized() -> Self {
        Self::new(SearchFailureKind::Unauthorized, "Invalid Brave API key")
    }

    fn api(status: StatusCode, body: &str) -> Self {
        Self::new(
            SearchFailureKind::Api,
            format!("Brave API returned {}: {body}", status.as_u16()),
        )
    }

    fn transport(err: reqwest::Error) -> Self {
        Self::new(SearchFailureKind::Transport, format!("Request failed: {err}"))
    }

    fn unexpected(err: impl std::fmt::Display) -> Self {
        Self::new(SearchFailureKind::Unexpected, format!("Search failed: {err}"))
    }
}

/// Result of one search tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<SearchResult>),
    Failure(SearchFailure),
}

impl SearchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Results(results) => results.as_slice(),
            Self::Failure(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&SearchFailure> {
        match self {
            Self::Results(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// The JSON handed back to the model: the result array, or a single
    /// `{"error": ...}` object in an array.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            Self::Results(results) => serde_json::Value::Array(
                results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "title": r.title,
                            "url": r.url,
                            "description": r.description,
                            "score": r.score,
                        })
                    })
                    .collect(),
            ),
            Self::Failure(failure) => serde_json::json!([{ "error": failure.message }]),
        }
    }
}

impl From<SearchFailure> for SearchOutcome {
    fn from(failure: SearchFailure) -> Self {
        Self::Failure(failure)
    }
}

/// HTTP client for the Brave web search endpoint.
#[derive(Debug, Clone)]
pub struct BraveSearchClient {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl BraveSearchClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("research-agent/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_url: BRAVE_SEARCH_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Point at a different endpoint (a mock server in tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate, search, and normalize. Empty queries and keys return a
    /// failure without touching the network.
    pub async fn invoke(&self, query: &str, max_results: i64, api_key: &str) -> SearchOutcome {
        let request = match SearchQuery::new(query, max_results) {
            Ok(request) => request,
            Err(failure) => return failure.into(),
        };

        let api_key = api_key.trim();
        if api_key.is_empty() {
            return SearchFailure::missing_api_key().into();
        }

        self.search(&request, api_key).await
    }

    /// Run an already-validated query.
    pub async fn search(&self, request: &SearchQuery, api_key: &str) -> SearchOutcome {
        tracing::info!(query = request.query(), count = request.max_results(), "Searching Brave");

        match self.fetch(request, api_key).await {
            Ok(results) => {
                tracing::info!(
                    query = request.query(),
                    found = results.len(),
                    "Brave search complete"
                );
                SearchOutcome::Results(results)
            }
            Err(failure) => {
                match failure.kind {
                    SearchFailureKind::Transport | SearchFailureKind::Unexpected => {
                        tracing::error!(query = request.query(), "{failure}")
                    }
                    _ => tracing::warn!(query = request.query(), "{failure}"),
                }
                failure.into()
            }
        }
    }

    async fn fetch(
        &self,
        request: &SearchQuery,
        api_key: &str,
    ) -> Result<Vec<SearchResult>, SearchFailure> {
        let count = request.max_results().to_string();
        let resp = self
            .client
            .get(&self.api_url)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .query(&[("q", request.query()), ("count", count.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(SearchFailure::transport)?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(SearchFailure::rate_limited()),
            StatusCode::UNAUTHORIZED => return Err(SearchFailure::unauthorized()),
            StatusCode::OK => {}
            status => {
                let body = resp.text().await.unwrap_or_default();
                return Err(SearchFailure::api(status, &body));
            }
        }

        let body = resp.bytes().await.map_err(SearchFailure::transport)?;
        let parsed: BraveSearchResponse =
            serde_json::from_slice(&body).map_err(SearchFailure::unexpected)?;

        Ok(normalize(parsed, request.max_results()))
    }
}

impl Default for BraveSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Upstream may return more hits than asked for; keep the first `max_results`.
fn normalize(response: BraveSearchResponse, max_results: u32) -> Vec<SearchResult> {
    response
        .web
        .and_then(|w| w.results)
        .unwrap_or_default()
        .into_iter()
        .take(max_results as usize)
        .enumerate()
        .map(|(rank, hit)| SearchResult {
            title: hit.title.unwrap_or_default(),
            url: hit.url.unwrap_or_default(),
            description: hit.description.unwrap_or_default(),
            score: rank_score(rank),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Brave Search API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Option<Vec<BraveWebHit>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
