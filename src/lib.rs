//! Hermes - YouTube transcripts with a client-side fallback and AI flashcards
//!
//! This library fetches video transcripts server-side, hands the caller a
//! self-contained browser fetch routine when YouTube blocks the server, and turns
//! transcripts into multiple-choice flashcards through a generative-text provider.

pub mod cli;
pub mod config;
pub mod flashcards;
pub mod orchestrator;
pub mod output;
pub mod server;
pub mod sources;
pub mod utils;

use serde::{Deserialize, Serialize};

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use flashcards::{FlashcardPipeline, FlashcardSet, GeneratedFlashcards};
pub use orchestrator::{HybridOrchestrator, TranscriptResponse};
pub use sources::{FetchOutcome, Transcript, TranscriptEntry, TranscriptSource, VideoId};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Classification of a failed transcript fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No video id could be resolved from the input
    InvalidUrl,
    /// YouTube rejected the server's network origin
    Blocked,
    /// The video has captions turned off
    Disabled,
    /// No caption track in any of the requested languages
    NotFound,
    /// The upstream call did not finish in time
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::Blocked => "blocked",
            ErrorKind::Disabled => "disabled",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transcript fetch failure, classified where the upstream error was observed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_url(input: &str) -> Self {
        Self::new(ErrorKind::InvalidUrl, format!("Invalid YouTube URL: {}", input))
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Blocked, message)
    }

    pub fn disabled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Disabled, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::new(ErrorKind::Timeout, format!("Request to YouTube timed out: {}", err))
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            FetchError::blocked(format!("Too many requests, YouTube is blocking this IP: {}", err))
        } else {
            FetchError::unknown(err.to_string())
        }
    }
}

/// Error types produced by the flashcard pipeline
#[derive(thiserror::Error, Debug)]
pub enum FlashcardError {
    #[error("Flashcard generation failed: {0}")]
    GenerationFailed(String),

    #[error("Model returned malformed flashcard data: {0}")]
    MalformedModelOutput(String),

    #[error("Flashcard generation is not configured (missing API key)")]
    CapabilityNotConfigured,

    #[error("Flashcard generation timed out: {0}")]
    Timeout(String),
}

impl FlashcardError {
    pub fn kind(&self) -> &'static str {
        match self {
            FlashcardError::GenerationFailed(_) => "generation_failed",
            FlashcardError::MalformedModelOutput(_) => "malformed_model_output",
            FlashcardError::CapabilityNotConfigured => "capability_not_configured",
            FlashcardError::Timeout(_) => "timeout",
        }
    }
}
