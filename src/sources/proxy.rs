use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::trusted::USER_AGENT;
use super::youtube::InnertubeClient;
use super::{FetchOutcome, SourceKind, TranscriptSource, VideoId};
use crate::Result;

const WEBSHARE_DOMAIN: &str = "p.webshare.io";
const WEBSHARE_PORT: u16 = 80;

/// Webshare rotating residential proxy credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl ProxyCredentials {
    /// Proxy URL with the `-rotate` suffix so every request gets a fresh exit IP
    pub fn proxy_url(&self) -> String {
        format!(
            "http://{}-rotate:{}@{}:{}/",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            WEBSHARE_DOMAIN,
            WEBSHARE_PORT
        )
    }
}

/// Fetches transcripts through a rotating proxy instead of the server's own IP
pub struct ProxyFetch {
    client: InnertubeClient,
}

impl ProxyFetch {
    pub fn new(credentials: &ProxyCredentials, timeout: Duration) -> Result<Self> {
        let proxy = Proxy::all(credentials.proxy_url()).context("Invalid proxy configuration")?;

        // No idle connections: each request must get a new exit IP
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .proxy(proxy)
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            client: InnertubeClient::new(http),
        })
    }
}

#[async_trait]
impl TranscriptSource for ProxyFetch {
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> FetchOutcome {
        self.client.fetch_outcome(video_id, languages, self.kind()).await
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Proxy
    }
}
