use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod delegated;
pub mod proxy;
pub mod trusted;
pub mod youtube;

pub use delegated::{ClientDelegatedFetch, DelegatedFetcher};
pub use proxy::{ProxyCredentials, ProxyFetch};
pub use trusted::TrustedFetch;

use crate::config::Config;
use crate::{ErrorKind, FetchError};

lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(
        r"(?:[?&]v=|youtu\.be/|/embed/|/shorts/|/live/|/v/)([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)"
    )
    .unwrap();
    static ref BARE_ID_RE: Regex = Regex::new(r"^[0-9A-Za-z_-]{11}$").unwrap();
}

/// Canonical 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Resolve a video id from a watch link, short link, embed/shorts path or bare id.
    ///
    /// The first recognized position wins; anything else is an `InvalidUrl` failure.
    pub fn resolve(input: &str) -> Result<Self, FetchError> {
        let trimmed = input.trim();

        if BARE_ID_RE.is_match(trimmed) {
            return Ok(Self(trimmed.to_string()));
        }

        VIDEO_ID_RE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| FetchError::invalid_url(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One timed line of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    #[serde(default)]
    pub duration: f64,
}

/// A fetched transcript in a single language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: VideoId,

    /// Human readable language name, e.g. "English (auto-generated)"
    pub language: String,

    pub language_code: String,

    /// True for YouTube's automatic speech recognition tracks
    pub is_generated: bool,

    /// Entries ordered by start time
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// End of the last entry, if any
    pub fn duration(&self) -> Option<f64> {
        self.entries.last().map(|e| e.start + e.duration)
    }
}

/// Result of asking a transcript source for a video
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Transcript),

    /// The server cannot fetch this transcript; the caller should run the fetcher itself
    NeedsClientFetch {
        video_id: VideoId,
        fetcher: DelegatedFetcher,
        reason: String,
        /// Classification of the server-side failure that led to delegation
        kind: ErrorKind,
    },

    Failure(FetchError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Which fetch path a source represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Trusted,
    Proxy,
    ClientDelegated,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Trusted => "trusted",
            SourceKind::Proxy => "proxy",
            SourceKind::ClientDelegated => "client_delegated",
        }
    }
}

/// Capability for obtaining a transcript for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the first available transcript following the language preference order
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> FetchOutcome;

    /// Which fetch path this source implements
    fn kind(&self) -> SourceKind;
}

/// Build the server-side source for this process.
///
/// The proxy variant is used whenever proxy credentials are configured; the
/// choice is fixed for the lifetime of the process.
pub fn from_config(config: &Config) -> crate::Result<Arc<dyn TranscriptSource>> {
    let timeout = Duration::from_secs(config.youtube.request_timeout_secs);

    match &config.youtube.proxy {
        Some(credentials) => {
            tracing::info!("Using proxied transcript fetching via Webshare");
            Ok(Arc::new(ProxyFetch::new(credentials, timeout)?))
        }
        None => {
            tracing::info!("Using direct transcript fetching");
            Ok(Arc::new(TrustedFetch::new(timeout)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_resolve_watch_and_short_links_agree() {
        let urls = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ#comments",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "  dQw4w9WgXcQ  ",
        ];

        for url in urls {
            let id = VideoId::resolve(url).unwrap_or_else(|e| panic!("{}: {}", url, e));
            assert_eq!(id.as_str(), "dQw4w9WgXcQ", "{}", url);
        }
    }

    #[test]
    fn test_resolve_ids_with_dash_and_underscore() {
        let id = VideoId::resolve("https://youtu.be/a-b_c-d_e-f").unwrap();
        assert_eq!(id.as_str(), "a-b_c-d_e-f");
    }

    #[test]
    fn test_resolve_rejects_urls_without_id() {
        let invalid = [
            "",
            "not a url",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQX",
            "https://example.com/some/path",
            "https://vimeo.com/123456789",
        ];

        for url in invalid {
            let err = VideoId::resolve(url).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidUrl, "{}", url);
        }
    }

    #[test]
    fn test_transcript_duration() {
        let transcript = Transcript {
            video_id: VideoId::resolve("dQw4w9WgXcQ").unwrap(),
            language: "English".to_string(),
            language_code: "en".to_string(),
            is_generated: false,
            entries: vec![
                TranscriptEntry { text: "a".into(), start: 0.0, duration: 2.0 },
                TranscriptEntry { text: "b".into(), start: 2.0, duration: 3.0 },
            ],
        };

        assert_eq!(transcript.duration(), Some(5.0));
    }

    #[test]
    fn test_entry_duration_defaults_to_zero() {
        let entry: TranscriptEntry =
            serde_json::from_str(r#"{"text": "hi", "start": 1.5}"#).unwrap();
        assert_eq!(entry.duration, 0.0);
    }
}
