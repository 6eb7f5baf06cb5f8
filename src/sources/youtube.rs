//! YouTube wire client shared by the trusted and proxied sources.
//!
//! Transcripts are fetched the way the Android app does it: scrape the innertube
//! API key from the watch page, ask the player endpoint for caption tracks, then
//! download the timed-text XML of the chosen track. Upstream failures are
//! classified into [`ErrorKind`]s right here, where the raw response is visible.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{FetchOutcome, SourceKind, Transcript, TranscriptEntry, VideoId};
use crate::{ErrorKind, FetchError};

const WATCH_URL: &str = "https://www.youtube.com/watch";
const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

lazy_static! {
    static ref API_KEY_RE: Regex = Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).unwrap();
    static ref TEXT_RE: Regex = Regex::new(r#"(?s)<text\b([^>]*)>(.*?)</text>"#).unwrap();
    static ref START_ATTR_RE: Regex = Regex::new(r#"\bstart="([^"]*)""#).unwrap();
    static ref DUR_ATTR_RE: Regex = Regex::new(r#"\bdur="([^"]*)""#).unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref ENTITY_RE: Regex = Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub name: Option<TrackName>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackName {
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<TrackNameRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackNameRun {
    text: String,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    pub fn display_name(&self) -> String {
        self.name
            .as_ref()
            .and_then(|n| {
                n.simple_text
                    .clone()
                    .or_else(|| n.runs.first().map(|r| r.text.clone()))
            })
            .unwrap_or_else(|| self.language_code.clone())
    }
}

/// Client for YouTube's watch page, innertube player endpoint and timed-text tracks
#[derive(Clone)]
pub struct InnertubeClient {
    http: Client,
}

impl InnertubeClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// [`fetch_transcript`](Self::fetch_transcript) folded into a [`FetchOutcome`] for `source`
    pub async fn fetch_outcome(
        &self,
        video_id: &VideoId,
        languages: &[String],
        source: SourceKind,
    ) -> FetchOutcome {
        match self.fetch_transcript(video_id, languages).await {
            Ok(transcript) => FetchOutcome::Success(transcript),
            Err(err) => {
                tracing::debug!(
                    "{} fetch for {} failed ({}): {}",
                    source.as_str(),
                    video_id,
                    err.kind,
                    err
                );
                FetchOutcome::Failure(err)
            }
        }
    }

    /// Fetch a transcript following the language preference order
    pub async fn fetch_transcript(
        &self,
        video_id: &VideoId,
        languages: &[String],
    ) -> Result<Transcript, FetchError> {
        let html = self.fetch_watch_page(video_id).await?;
        let api_key = extract_api_key(&html)?;

        let tracks = self.fetch_caption_tracks(video_id, &api_key).await?;
        let track = select_track(&tracks, languages)?;

        tracing::debug!(
            "Selected caption track {} ({}) for {}",
            track.language_code,
            if track.is_generated() { "generated" } else { "manual" },
            video_id
        );

        let xml = self.fetch_track_xml(track).await?;
        let entries = parse_timed_text(&xml);

        Ok(Transcript {
            video_id: video_id.clone(),
            language: track.display_name(),
            language_code: track.language_code.clone(),
            is_generated: track.is_generated(),
            entries,
        })
    }

    async fn fetch_watch_page(&self, video_id: &VideoId) -> Result<String, FetchError> {
        tracing::debug!("Fetching watch page for {}", video_id);

        let response = self
            .http
            .get(WATCH_URL)
            .query(&[("v", video_id.as_str())])
            .header("Accept-Language", "en-US")
            .header("Cookie", "CONSENT=YES+cb")
            .send()
            .await?;

        check_status(response.status(), "watch page")?;
        Ok(response.text().await?)
    }

    async fn fetch_caption_tracks(
        &self,
        video_id: &VideoId,
        api_key: &str,
    ) -> Result<Vec<CaptionTrack>, FetchError> {
        let response = self
            .http
            .post(PLAYER_URL)
            .query(&[("key", api_key)])
            .json(&json!({
                "context": {
                    "client": {
                        "clientName": INNERTUBE_CLIENT_NAME,
                        "clientVersion": INNERTUBE_CLIENT_VERSION,
                    }
                },
                "videoId": video_id.as_str(),
            }))
            .send()
            .await?;

        check_status(response.status(), "player endpoint")?;

        let player: PlayerResponse = response
            .json()
            .await
            .map_err(|e| FetchError::unknown(format!("Failed to parse player response: {}", e)))?;

        caption_tracks(player)
    }

    async fn fetch_track_xml(&self, track: &CaptionTrack) -> Result<String, FetchError> {
        let url = track.base_url.replace("&fmt=srv3", "");
        let response = self.http.get(&url).send().await?;

        check_status(response.status(), "caption track")?;
        Ok(response.text().await?)
    }
}

fn check_status(status: StatusCode, what: &str) -> Result<(), FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::blocked(format!(
            "Too many requests: YouTube is blocking requests from this IP ({})",
            what
        )));
    }

    if !status.is_success() {
        return Err(FetchError::unknown(format!(
            "YouTube {} request failed: HTTP {}",
            what, status
        )));
    }

    Ok(())
}

fn extract_api_key(html: &str) -> Result<String, FetchError> {
    if let Some(caps) = API_KEY_RE.captures(html) {
        return Ok(caps[1].to_string());
    }

    if html.contains("class=\"g-recaptcha\"") {
        return Err(FetchError::blocked(
            "YouTube is blocking requests from this IP (captcha challenge)",
        ));
    }

    Err(FetchError::unknown("Could not find the innertube API key on the watch page"))
}

fn caption_tracks(player: PlayerResponse) -> Result<Vec<CaptionTrack>, FetchError> {
    if let Some(playability) = player.playability_status {
        let status = playability.status.unwrap_or_else(|| "OK".to_string());
        let reason = playability.reason.unwrap_or_default();

        if status == "LOGIN_REQUIRED" && reason.to_lowercase().contains("bot") {
            return Err(FetchError::blocked(format!(
                "YouTube is blocking requests from this IP: {}",
                reason
            )));
        }

        if status != "OK" {
            let reason = if reason.is_empty() { status } else { reason };
            return Err(FetchError::unknown(format!("Video unavailable: {}", reason)));
        }
    }

    let tracks = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .map(|r| r.caption_tracks)
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(FetchError::disabled("Transcripts are disabled for this video"));
    }

    Ok(tracks)
}

/// Pick the first track matching the language preference, manual tracks before generated ones
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
) -> Result<&'a CaptionTrack, FetchError> {
    for language in languages {
        let candidates = tracks.iter().filter(|t| &t.language_code == language);

        if let Some(track) = candidates.clone().find(|t| !t.is_generated()) {
            return Ok(track);
        }
        if let Some(track) = candidates.clone().find(|t| t.is_generated()) {
            return Ok(track);
        }
    }

    let available: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
    Err(FetchError::new(
        ErrorKind::NotFound,
        format!(
            "No transcript found for any of the requested languages [{}] (available: [{}])",
            languages.join(", "),
            available.join(", ")
        ),
    ))
}

/// Decode a timed-text XML document into transcript entries
pub fn parse_timed_text(xml: &str) -> Vec<TranscriptEntry> {
    TEXT_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

            let start = attr_f64(&START_ATTR_RE, attrs)?;
            let duration = attr_f64(&DUR_ATTR_RE, attrs).unwrap_or(0.0);

            // Entities are unescaped twice: once for the XML layer, once for HTML inside it
            let text = unescape_entities(&TAG_RE.replace_all(&unescape_entities(raw), ""));
            let text = text.trim();
            if text.is_empty() {
                return None;
            }

            Some(TranscriptEntry {
                text: text.to_string(),
                start,
                duration,
            })
        })
        .collect()
}

fn attr_f64(re: &Regex, attrs: &str) -> Option<f64> {
    re.captures(attrs)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Decode named and numeric HTML entities, leaving unknown ones untouched
pub(crate) fn unescape_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };

            decoded
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
