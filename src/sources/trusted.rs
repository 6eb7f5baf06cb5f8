use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::youtube::InnertubeClient;
use super::{FetchOutcome, SourceKind, TranscriptSource, VideoId};
use crate::Result;

/// Browser user agent sent on all direct YouTube requests
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Fetches transcripts directly from the server's own network identity
pub struct TrustedFetch {
    client: InnertubeClient,
}

impl TrustedFetch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client: InnertubeClient::new(http),
        })
    }
}

#[async_trait]
impl TranscriptSource for TrustedFetch {
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> FetchOutcome {
        self.client.fetch_outcome(video_id, languages, self.kind()).await
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Trusted
    }
}
