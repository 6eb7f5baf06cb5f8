use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod metadata;
pub mod policy;

pub use metadata::{MetadataSource, VideoMetadata, WatchPageMetadata};
pub use policy::{ClassifiedPolicy, FallbackPolicy, MessageHeuristic};

use crate::sources::{
    ClientDelegatedFetch, DelegatedFetcher, FetchOutcome, TranscriptEntry, TranscriptSource, VideoId,
};
use crate::ErrorKind;

/// Which side ended up responsible for the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Server,
    Client,
}

/// Uniform response for every fetch outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub method: FetchMethod,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_generated: Option<bool>,

    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_client_fetch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetcher: Option<DelegatedFetcher>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl TranscriptResponse {
    fn empty(method: FetchMethod) -> Self {
        Self {
            success: false,
            method,
            video_id: None,
            title: None,
            channel: None,
            language: None,
            language_code: None,
            is_generated: None,
            transcript: Vec::new(),
            require_client_fetch: false,
            fetcher: None,
            error: None,
            error_kind: None,
        }
    }

    /// Normalize an outcome; `metadata` is only used for successful fetches
    pub fn from_outcome(outcome: FetchOutcome, metadata: Option<VideoMetadata>) -> Self {
        match outcome {
            FetchOutcome::Success(transcript) => {
                let metadata =
                    metadata.unwrap_or_else(|| VideoMetadata::placeholder(&transcript.video_id));

                Self {
                    success: true,
                    video_id: Some(transcript.video_id),
                    title: Some(metadata.title),
                    channel: Some(metadata.channel),
                    language: Some(transcript.language),
                    language_code: Some(transcript.language_code),
                    is_generated: Some(transcript.is_generated),
                    transcript: transcript.entries,
                    ..Self::empty(FetchMethod::Server)
                }
            }
            FetchOutcome::NeedsClientFetch {
                video_id,
                fetcher,
                reason,
                kind,
            } => Self {
                video_id: Some(video_id),
                require_client_fetch: true,
                fetcher: Some(fetcher),
                error: Some(reason),
                error_kind: Some(kind),
                ..Self::empty(FetchMethod::Client)
            },
            FetchOutcome::Failure(err) => Self {
                error: Some(err.message),
                error_kind: Some(err.kind),
                ..Self::empty(FetchMethod::Server)
            },
        }
    }
}

/// Serves transcripts from the server when possible and delegates to the client when blocked
pub struct HybridOrchestrator {
    source: Arc<dyn TranscriptSource>,
    delegate: ClientDelegatedFetch,
    policy: Arc<dyn FallbackPolicy>,
    metadata: Option<Arc<dyn MetadataSource>>,
    default_languages: Vec<String>,
}

impl HybridOrchestrator {
    pub fn new(source: Arc<dyn TranscriptSource>, default_languages: Vec<String>) -> Self {
        Self {
            source,
            delegate: ClientDelegatedFetch::new(),
            policy: Arc::new(ClassifiedPolicy::default()),
            metadata: None,
            default_languages,
        }
    }

    /// Replace the blocking detection policy
    pub fn with_policy(mut self, policy: Arc<dyn FallbackPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Enrich successful responses with title and channel
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn default_languages(&self) -> &[String] {
        &self.default_languages
    }

    pub fn delegate(&self) -> &ClientDelegatedFetch {
        &self.delegate
    }

    /// Fetch a transcript for `url` with the configured language preference
    pub async fn fetch_default(&self, url: &str) -> FetchOutcome {
        self.fetch(url, &self.default_languages).await
    }

    /// Resolve the video id, try the server-side source once and decide what to hand back.
    ///
    /// An empty `languages` slice falls back to the configured defaults. Delegation
    /// is returned to the caller; the source is never retried.
    pub async fn fetch(&self, url: &str, languages: &[String]) -> FetchOutcome {
        let video_id = match VideoId::resolve(url) {
            Ok(id) => id,
            Err(err) => {
                tracing::debug!("Rejecting input {:?}: {}", url, err);
                return FetchOutcome::Failure(err);
            }
        };

        let languages = if languages.is_empty() {
            self.default_languages.as_slice()
        } else {
            languages
        };

        tracing::info!(
            "Fetching transcript for {} via {} source (languages: {})",
            video_id,
            self.source.kind().as_str(),
            languages.join(", ")
        );

        match self.source.fetch(&video_id, languages).await {
            FetchOutcome::Failure(err) if self.policy.should_delegate(&err) => {
                tracing::warn!(
                    "Server-side fetch for {} looks blocked ({}), delegating to client: {}",
                    video_id,
                    err.kind,
                    err
                );
                self.delegate.delegate(
                    &video_id,
                    languages,
                    err.kind,
                    format!("Server fetch blocked, fetch client-side instead: {}", err),
                )
            }
            FetchOutcome::Failure(err) => {
                tracing::info!("Transcript fetch for {} failed ({}): {}", video_id, err.kind, err);
                FetchOutcome::Failure(err)
            }
            outcome => {
                if let FetchOutcome::Success(transcript) = &outcome {
                    tracing::info!(
                        "Fetched {} transcript entries for {} ({})",
                        transcript.entries.len(),
                        video_id,
                        transcript.language_code
                    );
                }
                outcome
            }
        }
    }

    /// Fetch and normalize into a [`TranscriptResponse`], adding title and channel on success
    pub async fn transcript_response(&self, url: &str, languages: &[String]) -> TranscriptResponse {
        let outcome = self.fetch(url, languages).await;

        let metadata = match &outcome {
            FetchOutcome::Success(transcript) => Some(self.metadata_for(&transcript.video_id).await),
            _ => None,
        };

        TranscriptResponse::from_outcome(outcome, metadata)
    }

    /// Best effort: any failure yields placeholder metadata
    pub async fn metadata_for(&self, video_id: &VideoId) -> VideoMetadata {
        let Some(source) = &self.metadata else {
            return VideoMetadata::placeholder(video_id);
        };

        match source.fetch_metadata(video_id).await {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::debug!("Metadata lookup for {} failed: {:#}", video_id, err);
                VideoMetadata::placeholder(video_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::metadata::MockMetadataSource;
    use super::*;
    use crate::sources::{MockTranscriptSource, SourceKind, Transcript};
    use crate::FetchError;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn transcript() -> Transcript {
        Transcript {
            video_id: VideoId::resolve("dQw4w9WgXcQ").unwrap(),
            language: "English".to_string(),
            language_code: "en".to_string(),
            is_generated: false,
            entries: vec![
                TranscriptEntry { text: "a".into(), start: 0.0, duration: 2.0 },
                TranscriptEntry { text: "b".into(), start: 2.0, duration: 3.0 },
            ],
        }
    }

    fn source_returning(outcome: FetchOutcome) -> MockTranscriptSource {
        let mut source = MockTranscriptSource::new();
        source.expect_kind().return_const(SourceKind::Trusted);
        source
            .expect_fetch()
            .times(1)
            .returning(move |_, _| outcome.clone());
        source
    }

    fn orchestrator(source: MockTranscriptSource) -> HybridOrchestrator {
        HybridOrchestrator::new(Arc::new(source), vec!["en".to_string()])
    }

    #[tokio::test]
    async fn test_success_is_returned_unchanged() {
        let outcome = orchestrator(source_returning(FetchOutcome::Success(transcript())))
            .fetch(URL, &[])
            .await;

        match outcome {
            FetchOutcome::Success(t) => assert_eq!(t, transcript()),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_language_preference_is_passed_through() {
        let mut source = MockTranscriptSource::new();
        source.expect_kind().return_const(SourceKind::Trusted);
        source
            .expect_fetch()
            .withf(|id, languages| {
                id.as_str() == "dQw4w9WgXcQ"
                    && languages.len() == 2
                    && languages[0] == "de"
                    && languages[1] == "en"
            })
            .times(1)
            .returning(|_, _| FetchOutcome::Success(transcript()));

        let languages = vec!["de".to_string(), "en".to_string()];
        let outcome = orchestrator(source).fetch("https://youtu.be/dQw4w9WgXcQ", &languages).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_empty_languages_use_defaults() {
        let mut source = MockTranscriptSource::new();
        source.expect_kind().return_const(SourceKind::Trusted);
        source
            .expect_fetch()
            .withf(|_, languages| languages.len() == 1 && languages[0] == "en")
            .times(1)
            .returning(|_, _| FetchOutcome::Success(transcript()));

        assert!(orchestrator(source).fetch_default(URL).await.is_success());
    }

    #[tokio::test]
    async fn test_blocked_delegates_without_retry() {
        let source = source_returning(FetchOutcome::Failure(FetchError::blocked(
            "YouTube is blocking requests from this IP",
        )));

        match orchestrator(source).fetch(URL, &[]).await {
            FetchOutcome::NeedsClientFetch { video_id, fetcher, reason, kind } => {
                assert_eq!(kind, ErrorKind::Blocked);
                assert_eq!(video_id.as_str(), "dQw4w9WgXcQ");
                assert_eq!(fetcher.languages, vec!["en"]);
                assert!(reason.contains("blocking"));
            }
            other => panic!("expected delegation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unclassified_blocked_message_delegates() {
        let source = source_returning(FetchOutcome::Failure(FetchError::unknown(
            "Request BLOCKED: too many requests from your network",
        )));

        let outcome = orchestrator(source).fetch(URL, &[]).await;
        assert!(matches!(
            outcome,
            FetchOutcome::NeedsClientFetch { kind: ErrorKind::Unknown, .. }
        ));
    }

    #[tokio::test]
    async fn test_delegated_response_keeps_original_kind() {
        let source = source_returning(FetchOutcome::Failure(FetchError::unknown(
            "Your IP has been temporarily restricted",
        )));
        let response = orchestrator(source).transcript_response(URL, &[]).await;

        assert!(response.require_client_fetch);
        assert_eq!(response.error_kind, Some(ErrorKind::Unknown));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error_kind"], "unknown");
    }

    #[tokio::test]
    async fn test_disabled_and_not_found_are_terminal() {
        for err in [
            FetchError::disabled("Transcripts are disabled for this video"),
            FetchError::not_found("No transcript found for any of the requested languages"),
        ] {
            let kind = err.kind;
            let outcome = orchestrator(source_returning(FetchOutcome::Failure(err))).fetch(URL, &[]).await;

            match outcome {
                FetchOutcome::Failure(e) => assert_eq!(e.kind, kind),
                other => panic!("expected failure, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_source() {
        let mut source = MockTranscriptSource::new();
        source.expect_fetch().never();

        match orchestrator(source).fetch("https://example.com/nothing", &[]).await {
            FetchOutcome::Failure(e) => assert_eq!(e.kind, ErrorKind::InvalidUrl),
            other => panic!("expected invalid url, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_policy_replaces_heuristic() {
        let source = source_returning(FetchOutcome::Failure(FetchError::unknown("request was blocked")));

        let outcome = orchestrator(source)
            .with_policy(Arc::new(ClassifiedPolicy::strict()))
            .fetch(URL, &[])
            .await;

        assert!(matches!(outcome, FetchOutcome::Failure(_)));
    }

    #[tokio::test]
    async fn test_response_includes_metadata() {
        let mut metadata = MockMetadataSource::new();
        metadata.expect_fetch_metadata().times(1).returning(|id| {
            Ok(VideoMetadata {
                video_id: id.clone(),
                title: "Never Gonna Give You Up".to_string(),
                channel: "Rick Astley".to_string(),
            })
        });

        let response = orchestrator(source_returning(FetchOutcome::Success(transcript())))
            .with_metadata(Arc::new(metadata))
            .transcript_response(URL, &[])
            .await;

        assert!(response.success);
        assert_eq!(response.method, FetchMethod::Server);
        assert_eq!(response.title.as_deref(), Some("Never Gonna Give You Up"));
        assert_eq!(response.channel.as_deref(), Some("Rick Astley"));
        assert_eq!(response.transcript.len(), 2);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_metadata_failure_uses_placeholders() {
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_fetch_metadata()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let response = orchestrator(source_returning(FetchOutcome::Success(transcript())))
            .with_metadata(Arc::new(metadata))
            .transcript_response(URL, &[])
            .await;

        assert!(response.success);
        assert_eq!(response.title.as_deref(), Some("Video dQw4w9WgXcQ"));
        assert_eq!(response.channel.as_deref(), Some("Unknown Channel"));
    }

    #[tokio::test]
    async fn test_delegated_response_shape() {
        let source = source_returning(FetchOutcome::Failure(FetchError::blocked("captcha")));
        let response = orchestrator(source).transcript_response(URL, &[]).await;

        assert!(!response.success);
        assert!(response.require_client_fetch);
        assert_eq!(response.method, FetchMethod::Client);
        assert!(response.fetcher.is_some());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["method"], "client");
        assert_eq!(json["error_kind"], "blocked");
    }

    #[tokio::test]
    async fn test_failure_response_shape() {
        let source = source_returning(FetchOutcome::Failure(FetchError::disabled(
            "Transcripts are disabled for this video",
        )));
        let response = orchestrator(source).transcript_response(URL, &[]).await;

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Transcripts are disabled for this video");
        assert_eq!(json["error_kind"], "disabled");
        assert!(json.get("require_client_fetch").is_none());
        assert!(json.get("fetcher").is_none());
    }
}
