use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sources::trusted::USER_AGENT;
use crate::sources::youtube::unescape_entities;
use crate::sources::VideoId;
use crate::Result;

pub const UNKNOWN_CHANNEL: &str = "Unknown Channel";

lazy_static! {
    static ref TITLE_RE: Regex = Regex::new(r"(?s)<title>(.*?)</title>").unwrap();
    static ref AUTHOR_RE: Regex = Regex::new(r#""author":"([^"]+)""#).unwrap();
}

/// Display information about a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: VideoId,
    pub title: String,
    pub channel: String,
}

impl VideoMetadata {
    /// Stand-in used when the real metadata cannot be retrieved
    pub fn placeholder(video_id: &VideoId) -> Self {
        Self {
            video_id: video_id.clone(),
            title: format!("Video {}", video_id),
            channel: UNKNOWN_CHANNEL.to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, video_id: &VideoId) -> Result<VideoMetadata>;
}

/// Scrapes title and channel from the public watch page
pub struct WatchPageMetadata {
    client: Client,
}

impl WatchPageMetadata {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataSource for WatchPageMetadata {
    async fn fetch_metadata(&self, video_id: &VideoId) -> Result<VideoMetadata> {
        let response = self.client.get(video_id.watch_url()).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch watch page: HTTP {}", response.status());
        }

        let html = response.text().await?;
        Ok(parse_watch_page(video_id, &html))
    }
}

pub fn parse_watch_page(video_id: &VideoId, html: &str) -> VideoMetadata {
    let title = TITLE_RE
        .captures(html)
        .map(|caps| unescape_entities(caps[1].trim()))
        .map(|t| t.strip_suffix(" - YouTube").map(str::to_string).unwrap_or(t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "YouTube Video".to_string());

    let channel = AUTHOR_RE
        .captures(html)
        .map(|caps| unescape_entities(&caps[1]))
        .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string());

    VideoMetadata {
        video_id: video_id.clone(),
        title,
        channel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> VideoId {
        VideoId::resolve("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_parse_watch_page() {
        let html = r#"<html><head><title>Never Gonna Give You Up - YouTube</title></head>
            <script>var x = {"videoDetails":{"author":"Rick Astley","title":"x"}};</script>"#;

        let metadata = parse_watch_page(&id(), html);
        assert_eq!(metadata.title, "Never Gonna Give You Up");
        assert_eq!(metadata.channel, "Rick Astley");
    }

    #[test]
    fn test_parse_watch_page_decodes_entities() {
        let html = r#"<title>Tom &amp; Jerry &#39;Classic&#39; - YouTube</title>
            {"author":"Hanna &amp; Barbera"}"#;

        let metadata = parse_watch_page(&id(), html);
        assert_eq!(metadata.title, "Tom & Jerry 'Classic'");
        assert_eq!(metadata.channel, "Hanna & Barbera");
    }

    #[test]
    fn test_parse_watch_page_defaults() {
        let metadata = parse_watch_page(&id(), "<html></html>");
        assert_eq!(metadata.title, "YouTube Video");
        assert_eq!(metadata.channel, UNKNOWN_CHANNEL);
    }

    #[test]
    fn test_placeholder() {
        let metadata = VideoMetadata::placeholder(&id());
        assert_eq!(metadata.title, "Video dQw4w9WgXcQ");
        assert_eq!(metadata.channel, "Unknown Channel");
    }
}
