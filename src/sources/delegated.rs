use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{FetchOutcome, SourceKind, TranscriptSource, VideoId};
use crate::ErrorKind;

/// Browser routine that fetches and decodes a transcript from the caller's own network
pub const FETCHER_SCRIPT: &str = include_str!("../../assets/client_fetcher.js");

/// Class the caller instantiates after evaluating [`FETCHER_SCRIPT`]
pub const FETCHER_ENTRYPOINT: &str = "TranscriptFetcher";

const CLIENT_FETCH_TEMPLATE: &str = include_str!("../../assets/client_fetch.html");

pub const FETCHER_URL: &str = "/api/get-fetcher-code";
pub const SUBMIT_URL: &str = "/api/save-transcript";
pub const CLIENT_FETCH_URL: &str = "/api/client-fetch";

/// Self-contained fetch instructions handed to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatedFetcher {
    pub video_id: VideoId,
    pub languages: Vec<String>,
    pub entrypoint: String,
    pub script: String,
    pub usage: String,

    /// Where the script can be downloaded on its own
    pub fetcher_url: String,

    /// Where the caller should post the decoded transcript
    pub submit_url: String,
}

/// Example invocation of the fetcher script
pub fn usage_example(languages: &[String]) -> String {
    let languages = serde_json::to_string(languages).unwrap_or_else(|_| "[\"en\"]".to_string());
    format!(
        "const fetcher = new {}({});\nconst result = await fetcher.fetchTranscript(videoUrl);\n\
         if (result.success) {{\n  await fetch('{}', {{method: 'POST', headers: {{'Content-Type': 'application/json'}}, body: JSON.stringify(result)}});\n}}",
        FETCHER_ENTRYPOINT, languages, SUBMIT_URL
    )
}

/// Browser page that runs the fetcher script and posts the result to [`SUBMIT_URL`].
///
/// Only language codes made of ASCII alphanumerics, `-` and `_` are embedded into the script.
pub fn client_fetch_page(languages: &[String]) -> String {
    let languages: Vec<&str> = languages
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .collect();
    let languages = serde_json::to_string(&languages).unwrap_or_else(|_| "[]".to_string());

    CLIENT_FETCH_TEMPLATE
        .replace("{{FETCHER_SCRIPT}}", FETCHER_SCRIPT)
        .replace("{{ENTRYPOINT}}", FETCHER_ENTRYPOINT)
        .replace("{{LANGUAGES}}", &languages)
        .replace("{{SUBMIT_URL}}", SUBMIT_URL)
}

/// Source that never touches the network and instead hands out [`DelegatedFetcher`]s
#[derive(Debug, Clone, Default)]
pub struct ClientDelegatedFetch;

impl ClientDelegatedFetch {
    pub fn new() -> Self {
        Self
    }

    pub fn fetcher_for(&self, video_id: &VideoId, languages: &[String]) -> DelegatedFetcher {
        DelegatedFetcher {
            video_id: video_id.clone(),
            languages: languages.to_vec(),
            entrypoint: FETCHER_ENTRYPOINT.to_string(),
            script: FETCHER_SCRIPT.to_string(),
            usage: usage_example(languages),
            fetcher_url: FETCHER_URL.to_string(),
            submit_url: SUBMIT_URL.to_string(),
        }
    }

    /// Delegate with a reason that explains why the server did not fetch itself
    pub fn delegate(
        &self,
        video_id: &VideoId,
        languages: &[String],
        kind: ErrorKind,
        reason: impl Into<String>,
    ) -> FetchOutcome {
        FetchOutcome::NeedsClientFetch {
            video_id: video_id.clone(),
            fetcher: self.fetcher_for(video_id, languages),
            reason: reason.into(),
            kind,
        }
    }
}

#[async_trait]
impl TranscriptSource for ClientDelegatedFetch {
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> FetchOutcome {
        self.delegate(
            video_id,
            languages,
            ErrorKind::Blocked,
            "Transcript must be fetched client-side",
        )
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ClientDelegated
    }
}
