//! Media catalog types
//!
//! Results from the remote service are mapped to these explicit shapes at
//! the adapter boundary so the state machine never probes optional fields.

pub mod couchpotato;

pub use couchpotato::CouchPotatoClient;

use thiserror::Error;

/// Catalog error with classification
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Network, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Api, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Decode, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Connection failures, timeouts
    Network,
    /// The service answered but reported a failure
    Api,
    /// Response body did not have the expected shape
    Decode,
}

/// Where a candidate's external id comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Imdb,
    Tmdb,
}

/// A search result awaiting the user's choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 1-based position in the reply list
    pub ordinal: usize,
    pub title: String,
    pub year: Option<u32>,
    /// e.g. `7.4/10`
    pub rating: Option<String>,
    /// Minutes
    pub runtime: Option<u32>,
    pub external_id: String,
    pub thumbnail_url: Option<String>,
    pub source: CandidateSource,
    /// Keyboard button text; also what the user sends back to select it
    pub display_label: String,
}

impl Candidate {
    pub fn label_for(title: &str, year: Option<u32>) -> String {
        match year {
            Some(year) => format!("{title} - {year}"),
            None => title.to_string(),
        }
    }

    pub fn link(&self) -> String {
        title_link(self.source, &self.external_id)
    }
}

pub fn title_link(source: CandidateSource, external_id: &str) -> String {
    match source {
        CandidateSource::Imdb => format!("http://imdb.com/title/{external_id}"),
        CandidateSource::Tmdb => format!("https://www.themoviedb.org/movie/{external_id}"),
    }
}

/// Result of a title search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Vec<Candidate>),
    NotFound,
}

/// Quality profile as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProfile {
    pub label: String,
    pub handle: String,
    pub enabled: bool,
}

/// A selectable quality profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub ordinal: usize,
    pub label: String,
    /// Opaque id passed back to the service when adding a title
    pub handle: String,
}

/// Keep enabled profiles only, numbering them from 1
pub fn enabled_profiles(remote: Vec<RemoteProfile>) -> Vec<Profile> {
    remote
        .into_iter()
        .filter(|p| p.enabled)
        .enumerate()
        .map(|(i, p)| Profile {
            ordinal: i + 1,
            label: p.label,
            handle: p.handle,
        })
        .collect()
}

/// A title already tracked by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTitle {
    pub title: String,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
}

impl TrackedTitle {
    pub fn matches(&self, external_id: &str) -> bool {
        self.imdb_id.as_deref() == Some(external_id) || self.tmdb_id.as_deref() == Some(external_id)
    }

    pub fn link(&self) -> Option<String> {
        match (&self.imdb_id, &self.tmdb_id) {
            (Some(imdb), _) => Some(title_link(CandidateSource::Imdb, imdb)),
            (None, Some(tmdb)) => Some(title_link(CandidateSource::Tmdb, tmdb)),
            (None, None) => None,
        }
    }
}
