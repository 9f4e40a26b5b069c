//! CouchPotato HTTP API client

use super::{
    Candidate, CandidateSource, CatalogError, RemoteProfile, SearchOutcome, TrackedTitle,
};
use crate::config::CouchPotatoConfig;
use crate::runtime::Catalog;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub struct CouchPotatoClient {
    client: Client,
    api_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl CouchPotatoClient {
    pub fn new(config: &CouchPotatoConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}/{command}", self.api_url);
        let mut request = self.client.get(&url).query(params);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        tracing::debug!(command, "CouchPotato request");
        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::network(format!("{command}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::api(format!("{command} returned HTTP {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::decode(format!("{command}: {e}")))
    }
}

#[async_trait]
impl Catalog for CouchPotatoClient {
    async fn search_titles(&self, query: &str) -> Result<SearchOutcome, CatalogError> {
        let response: SearchResponse = self.call("movie.search", &[("q", query)]).await?;
        Ok(search_outcome(response))
    }

    async fn list_catalog(&self) -> Result<Vec<TrackedTitle>, CatalogError> {
        let response: MediaListResponse = self.call("media.list", &[]).await?;
        Ok(response.movies.into_iter().map(RawMedia::into_tracked).collect())
    }

    async fn list_profiles(&self) -> Result<Vec<RemoteProfile>, CatalogError> {
        let response: ProfileListResponse = self.call("profile.list", &[]).await?;
        let list = response
            .list
            .ok_or_else(|| CatalogError::api("could not get profiles, try searching again"))?;
        Ok(list
            .into_iter()
            .map(|p| RemoteProfile {
                label: p.label,
                handle: p.id,
                enabled: !p.hide.unwrap_or(false),
            })
            .collect())
    }

    async fn add_title(
        &self,
        identifier: &str,
        title: &str,
        profile_id: &str,
    ) -> Result<(), CatalogError> {
        let response: SuccessResponse = self
            .call(
                "movie.add",
                &[
                    ("identifier", identifier),
                    ("title", title),
                    ("profile_id", profile_id),
                ],
            )
            .await?;
        if response.success {
            Ok(())
        } else {
            Err(CatalogError::api("could not add movie, try searching again."))
        }
    }

    async fn full_search(&self) -> Result<(), CatalogError> {
        let _: Value = self.call("movie.searcher.full_search", &[]).await?;
        Ok(())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    movies: Option<Vec<RawMovie>>,
}

#[derive(Debug, Deserialize)]
struct RawMovie {
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    titles: Vec<String>,
    #[serde(default)]
    year: Option<Value>,
    #[serde(default)]
    rating: Option<RawRating>,
    #[serde(default)]
    imdb: Option<String>,
    #[serde(default)]
    tmdb_id: Option<Value>,
    #[serde(default)]
    images: Option<RawImages>,
    #[serde(default)]
    runtime: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRating {
    #[serde(default)]
    imdb: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawImages {
    #[serde(default)]
    poster: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MediaListResponse {
    #[serde(default)]
    movies: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    info: Option<RawMediaInfo>,
    #[serde(default)]
    imdb: Option<String>,
    #[serde(default)]
    tmdb_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMediaInfo {
    #[serde(default)]
    imdb: Option<String>,
    #[serde(default)]
    tmdb_id: Option<Value>,
    #[serde(default)]
    original_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileListResponse {
    #[serde(default)]
    list: Option<Vec<RawProfile>>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    #[serde(rename = "_id")]
    id: String,
    label: String,
    #[serde(default)]
    hide: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

/// Render a JSON scalar (number or string) as an id string
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_u32(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|n| *n > 0)
}

fn search_outcome(response: SearchResponse) -> SearchOutcome {
    let candidates: Vec<Candidate> = response
        .movies
        .unwrap_or_default()
        .into_iter()
        .filter_map(RawMovie::into_parts)
        .enumerate()
        .map(|(i, parts)| parts.into_candidate(i + 1))
        .collect();

    if candidates.is_empty() {
        SearchOutcome::NotFound
    } else {
        SearchOutcome::Found(candidates)
    }
}

struct CandidateParts {
    title: String,
    year: Option<u32>,
    rating: Option<String>,
    runtime: Option<u32>,
    external_id: String,
    thumbnail_url: Option<String>,
    source: CandidateSource,
}

impl CandidateParts {
    fn into_candidate(self, ordinal: usize) -> Candidate {
        Candidate {
            ordinal,
            display_label: Candidate::label_for(&self.title, self.year),
            title: self.title,
            year: self.year,
            rating: self.rating,
            runtime: self.runtime,
            external_id: self.external_id,
            thumbnail_url: self.thumbnail_url,
            source: self.source,
        }
    }
}

impl RawMovie {
    /// Movies without a title or any external id cannot be added, so they are skipped
    fn into_parts(self) -> Option<CandidateParts> {
        let title = self
            .original_title
            .filter(|t| !t.is_empty())
            .or_else(|| self.titles.into_iter().next())?;

        let (external_id, source) = match (self.imdb.filter(|s| !s.is_empty()), &self.tmdb_id) {
            (Some(imdb), _) => (imdb, CandidateSource::Imdb),
            (None, Some(tmdb)) => (scalar_to_string(tmdb)?, CandidateSource::Tmdb),
            (None, None) => return None,
        };

        let rating = self
            .rating
            .and_then(|r| r.imdb.into_iter().next())
            .and_then(|score| match score {
                Value::Number(n) => Some(format!("{n}/10")),
                _ => None,
            });

        Some(CandidateParts {
            title,
            year: self.year.as_ref().and_then(scalar_to_u32),
            rating,
            runtime: self.runtime.as_ref().and_then(scalar_to_u32),
            external_id,
            thumbnail_url: self.images.and_then(|i| i.poster.into_iter().next()),
            source,
        })
    }
}

impl RawMedia {
    fn into_tracked(self) -> TrackedTitle {
        let info = self.info;
        let imdb_id = info
            .as_ref()
            .and_then(|i| i.imdb.clone())
            .or(self.imdb)
            .filter(|s| !s.is_empty());
        let tmdb_id = info
            .as_ref()
            .and_then(|i| i.tmdb_id.as_ref().and_then(scalar_to_string))
            .or_else(|| self.tmdb_id.as_ref().and_then(scalar_to_string));
        let title = self
            .title
            .or_else(|| info.and_then(|i| i.original_title))
            .unwrap_or_default();

        TrackedTitle {
            title,
            imdb_id,
            tmdb_id,
        }
    }
}
