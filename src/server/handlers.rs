use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AppState;
use crate::flashcards::GeneratedFlashcards;
use crate::orchestrator::TranscriptResponse;
use crate::sources::delegated::{client_fetch_page, usage_example, FETCHER_ENTRYPOINT, FETCHER_SCRIPT};
use crate::sources::TranscriptEntry;
use crate::utils::parse_language_list;

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    /// Comma separated language codes, e.g. `de,en`
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub video_url: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardRequest {
    pub transcript: Vec<TranscriptEntry>,
    #[serde(default)]
    pub title: String,
    pub duration: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FlashcardResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: GeneratedFlashcards,
}

/// Summary of a transcript a client fetched on its own
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientTranscriptReport {
    video_id: Option<String>,
    #[serde(default)]
    transcript: Vec<TranscriptEntry>,
    language_code: Option<String>,
}

fn failure(error: impl std::fmt::Display, kind: &str) -> Json<Value> {
    Json(json!({
        "success": false,
        "error": error.to_string(),
        "error_kind": kind,
    }))
}

pub async fn index(State(state): State<AppState>) -> Response {
    let Some(path) = state.html_path.as_ref() else {
        return (StatusCode::NOT_FOUND, "No HTML viewer configured").into_response();
    };

    match tokio::fs::read_to_string(path).await {
        Ok(html) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
        Err(err) => {
            tracing::warn!("Cannot serve {}: {}", path.display(), err);
            (StatusCode::NOT_FOUND, "HTML viewer not found").into_response()
        }
    }
}

pub async fn transcript_by_id(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> Json<TranscriptResponse> {
    let languages = query.lang.as_deref().map(parse_language_list).unwrap_or_default();
    Json(state.orchestrator.transcript_response(&video_id, &languages).await)
}

pub async fn transcript_by_url(
    State(state): State<AppState>,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => Json(
            state
                .orchestrator
                .transcript_response(&request.video_url, &request.languages)
                .await,
        )
        .into_response(),
        Err(rejection) => failure(rejection.body_text(), "invalid_request").into_response(),
    }
}

pub async fn flashcards(
    State(state): State<AppState>,
    payload: Result<Json<FlashcardRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return failure(rejection.body_text(), "invalid_request").into_response(),
    };

    match state
        .flashcards
        .generate_with_duration(&request.transcript, &request.title, request.duration)
        .await
    {
        Ok(result) => Json(FlashcardResponse {
            success: true,
            result,
        })
        .into_response(),
        Err(err) => {
            tracing::warn!("Flashcard generation for \"{}\" failed: {}", request.title, err);
            failure(&err, err.kind()).into_response()
        }
    }
}

/// Sink for transcripts fetched client-side
pub async fn save_transcript(payload: Result<Json<Value>, JsonRejection>) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return failure(rejection.body_text(), "invalid_request").into_response(),
    };

    let video_id = body.get("videoId").cloned().unwrap_or(Value::Null);

    match serde_json::from_value::<ClientTranscriptReport>(body) {
        Ok(report) => tracing::info!(
            "Received client-side transcript for {} ({} entries, language {})",
            report.video_id.as_deref().unwrap_or("unknown video"),
            report.transcript.len(),
            report.language_code.as_deref().unwrap_or("unknown")
        ),
        Err(err) => tracing::info!("Received client-side payload in an unrecognized shape: {}", err),
    }

    Json(json!({
        "status": "success",
        "message": "Transcript saved",
        "videoId": video_id,
        "received_at": chrono::Utc::now(),
        "receipt": uuid::Uuid::new_v4().to_string(),
    }))
    .into_response()
}

/// In-browser fetcher page; `?lang=` overrides the configured languages
pub async fn client_fetch(State(state): State<AppState>, Query(query): Query<LanguageQuery>) -> Response {
    let languages = query
        .lang
        .as_deref()
        .map(parse_language_list)
        .filter(|langs| !langs.is_empty())
        .unwrap_or_else(|| state.orchestrator.default_languages().to_vec());

    Html(client_fetch_page(&languages)).into_response()
}

pub async fn fetcher_code(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "code": FETCHER_SCRIPT,
        "entrypoint": FETCHER_ENTRYPOINT,
        "usage": usage_example(state.orchestrator.default_languages()),
    }))
}
