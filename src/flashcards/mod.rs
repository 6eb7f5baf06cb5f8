use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

pub mod generator;

pub use generator::{ChatCompletionsGenerator, Provider, TextGenerator};

use crate::config::GenerationConfig;
use crate::sources::TranscriptEntry;
use crate::FlashcardError;

/// Videos longer than this get the larger card set
pub const LONG_VIDEO_THRESHOLD_SECS: f64 = 1500.0;
pub const LONG_VIDEO_CARDS: usize = 20;
pub const SHORT_VIDEO_CARDS: usize = 10;

const OUTPUT_SCHEMA: &str = r#"{
  "video_analysis": {
    "main_topic": "The central subject of the video",
    "key_themes": ["theme 1", "theme 2", "theme 3"],
    "video_intent": "What the video is trying to achieve (teach, persuade, entertain, ...)"
  },
  "flashcards": [
    {
      "question": "A question testing understanding of the content",
      "options": {"A": "first option", "B": "second option", "C": "third option", "D": "fourth option"},
      "correct_answer": "A",
      "explanation": "Why this answer is correct, referring to the video",
      "timestamp_seconds": 0,
      "related_quote": "The exact transcript line the question is based on"
    }
  ]
}"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    #[serde(default)]
    pub main_topic: String,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub video_intent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,

    /// Choice label ("A".."D") to option text
    pub options: BTreeMap<String, String>,

    pub correct_answer: String,

    #[serde(default)]
    pub explanation: String,

    #[serde(default)]
    pub timestamp_seconds: f64,

    #[serde(default)]
    pub related_quote: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardSet {
    #[serde(default)]
    pub video_analysis: VideoAnalysis,
    pub flashcards: Vec<Flashcard>,
}

/// A validated flashcard set annotated with what was requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFlashcards {
    #[serde(flatten)]
    pub set: FlashcardSet,

    pub num_flashcards: usize,

    /// Video length in seconds the card count was derived from
    pub video_duration: f64,
}

/// End of the last entry; `None` for an empty transcript
pub fn total_duration(entries: &[TranscriptEntry]) -> Option<f64> {
    entries.last().map(|e| e.start + e.duration)
}

pub fn card_count(duration: f64) -> usize {
    if duration > LONG_VIDEO_THRESHOLD_SECS {
        LONG_VIDEO_CARDS
    } else {
        SHORT_VIDEO_CARDS
    }
}

pub fn build_prompt(title: &str, entries: &[TranscriptEntry], num_cards: usize) -> String {
    let mut transcript = String::new();
    for entry in entries {
        let _ = writeln!(transcript, "[{}s] {}", entry.start.floor() as u64, entry.text);
    }

    format!(
        "You are an expert educator creating study material from a video.\n\n\
         VIDEO TITLE: {title}\n\n\
         TRANSCRIPT (each line is prefixed with its start time in seconds):\n\
         {transcript}\n\
         TASK:\n\
         1. Analyze the video: identify its main topic, key themes and intent.\n\
         2. Create exactly {num_cards} multiple-choice flashcards covering the most important ideas, \
         spread across the whole video.\n\
         3. Every flashcard has exactly four options labelled A, B, C and D, and one correct answer.\n\
         4. timestamp_seconds is the start time of the transcript line the question is based on, \
         and related_quote quotes that line.\n\n\
         OUTPUT: Return ONLY valid JSON, with no markdown and no commentary, in exactly this shape:\n\
         {OUTPUT_SCHEMA}\n"
    )
}

/// Parse model output, recovering the largest balanced `{...}` block if the text is not pure JSON
pub fn parse_model_output(text: &str) -> Result<FlashcardSet, FlashcardError> {
    let direct_err = match serde_json::from_str::<FlashcardSet>(text.trim()) {
        Ok(set) => return Ok(set),
        Err(err) => err,
    };

    let candidate = largest_json_object(text).ok_or_else(|| {
        FlashcardError::MalformedModelOutput(format!("response is not JSON: {}", direct_err))
    })?;

    serde_json::from_str(candidate)
        .map_err(|err| FlashcardError::MalformedModelOutput(format!("recovered JSON is invalid: {}", err)))
}

/// Longest balanced brace span at any depth, ignoring braces inside string literals.
///
/// Unmatched `{` never close, so they cannot hide balanced objects that follow them.
fn largest_json_object(text: &str) -> Option<&str> {
    let mut best: Option<(usize, usize)> = None;
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    let end = i + c.len_utf8();
                    if best.map_or(true, |(s, e)| end - start > e - s) {
                        best = Some((start, end));
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(s, e)| &text[s..e])
}

/// Check the answer invariant and normalize cosmetic model quirks
pub fn validate(mut set: FlashcardSet, strict: bool) -> Result<FlashcardSet, FlashcardError> {
    let mut seen = HashSet::new();
    set.video_analysis
        .key_themes
        .retain(|theme| seen.insert(theme.trim().to_lowercase()));

    for (index, card) in set.flashcards.iter_mut().enumerate() {
        let answer = card.correct_answer.trim().to_uppercase();
        if card.options.contains_key(&answer) {
            card.correct_answer = answer;
        } else if strict {
            return Err(FlashcardError::MalformedModelOutput(format!(
                "flashcard {} answers {:?}, which is not one of its options {:?}",
                index + 1,
                card.correct_answer,
                card.options.keys().collect::<Vec<_>>()
            )));
        }
    }

    Ok(set)
}

/// Turns a transcript into a validated multiple-choice flashcard set
pub struct FlashcardPipeline {
    generator: Option<Arc<dyn TextGenerator>>,
    strict: bool,
}

impl FlashcardPipeline {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, strict: bool) -> Self {
        Self { generator, strict }
    }

    /// Pipeline with no generator; every request reports the missing capability
    pub fn disabled() -> Self {
        Self::new(None, true)
    }

    pub fn from_config(config: &GenerationConfig) -> crate::Result<Self> {
        let generator = match &config.api_key {
            Some(key) => {
                tracing::info!("Flashcard generation enabled ({})", config.provider.name());
                let generator = ChatCompletionsGenerator::new(
                    config.provider,
                    key.clone(),
                    config.model.clone(),
                    Duration::from_secs(config.timeout_secs),
                )?;
                Some(Arc::new(generator) as Arc<dyn TextGenerator>)
            }
            None => {
                tracing::warn!(
                    "{} is not set, flashcard generation is disabled",
                    config.provider.config().env_var
                );
                None
            }
        };

        Ok(Self::new(generator, config.strict_validation))
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn generate(
        &self,
        transcript: &[TranscriptEntry],
        title: &str,
    ) -> Result<GeneratedFlashcards, FlashcardError> {
        self.generate_with_duration(transcript, title, None).await
    }

    /// Like [`generate`](Self::generate), but a positive caller-supplied duration wins over the computed one
    pub async fn generate_with_duration(
        &self,
        transcript: &[TranscriptEntry],
        title: &str,
        duration: Option<f64>,
    ) -> Result<GeneratedFlashcards, FlashcardError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(FlashcardError::CapabilityNotConfigured)?;

        let computed = total_duration(transcript).ok_or_else(|| {
            FlashcardError::GenerationFailed("transcript is empty".to_string())
        })?;
        let video_duration = duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(computed);

        let num_flashcards = card_count(video_duration);
        let prompt = build_prompt(title, transcript, num_flashcards);

        tracing::info!(
            "Generating {} flashcards for \"{}\" ({:.0}s, {} entries)",
            num_flashcards,
            title,
            video_duration,
            transcript.len()
        );

        let output = generator.generate(&prompt).await?;
        let set = validate(parse_model_output(&output)?, self.strict)?;

        tracing::info!("Generated {} flashcards", set.flashcards.len());

        Ok(GeneratedFlashcards {
            set,
            num_flashcards,
            video_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::generator::MockTextGenerator;
    use super::*;

    fn entry(text: &str, start: f64, duration: f64) -> TranscriptEntry {
        TranscriptEntry {
            text: text.to_string(),
            start,
            duration,
        }
    }

    const VALID_OUTPUT: &str = r#"{
        "video_analysis": {"main_topic": "Rust", "key_themes": ["ownership", "Ownership", "traits"], "video_intent": "teach"},
        "flashcards": [{
            "question": "What does the borrow checker enforce?",
            "options": {"A": "Aliasing rules", "B": "Indentation", "C": "Naming", "D": "Nothing"},
            "correct_answer": "a",
            "explanation": "It enforces aliasing XOR mutability.",
            "timestamp_seconds": 12,
            "related_quote": "the borrow checker enforces {aliasing} rules"
        }]
    }"#;

    fn pipeline_with(mock: MockTextGenerator, strict: bool) -> FlashcardPipeline {
        FlashcardPipeline::new(Some(Arc::new(mock)), strict)
    }

    #[test]
    fn test_total_duration() {
        let entries = vec![entry("a", 0.0, 2.0), entry("b", 2.0, 3.0)];
        assert_eq!(total_duration(&entries), Some(5.0));
        assert_eq!(total_duration(&[]), None);
    }

    #[test]
    fn test_card_count_boundary_is_strict() {
        assert_eq!(card_count(1501.0), 20);
        assert_eq!(card_count(1500.0), 10);
        assert_eq!(card_count(30.0), 10);
    }

    #[test]
    fn test_prompt_renders_floored_timestamps_in_order() {
        let entries = vec![entry("hello", 0.9, 1.0), entry("world", 61.7, 2.0)];
        let prompt = build_prompt("My Video", &entries, 10);

        assert!(prompt.contains("VIDEO TITLE: My Video"));
        let hello = prompt.find("[0s] hello").unwrap();
        let world = prompt.find("[61s] world").unwrap();
        assert!(hello < world);
        assert!(prompt.contains("exactly 10 multiple-choice"));
        assert!(prompt.contains("\"correct_answer\""));
    }

    #[test]
    fn test_parse_recovers_wrapped_json() {
        let wrapped = format!("Sure! Here you go:\n```json\n{}\n```\nHope it helps {{:}}", VALID_OUTPUT);
        let set = parse_model_output(&wrapped).unwrap();
        assert_eq!(set.flashcards.len(), 1);
        assert_eq!(
            set.flashcards[0].related_quote,
            "the borrow checker enforces {aliasing} rules"
        );
    }

    #[test]
    fn test_parse_rejects_text_without_braces() {
        let err = parse_model_output("I cannot help with that.").unwrap_err();
        assert!(matches!(err, FlashcardError::MalformedModelOutput(_)));
    }

    #[test]
    fn test_parse_requires_flashcards() {
        let err = parse_model_output(r#"{"video_analysis": {}}"#).unwrap_err();
        assert!(matches!(err, FlashcardError::MalformedModelOutput(_)));
    }

    #[test]
    fn test_largest_object_prefers_longest_span() {
        let text = r#"{"a":1} and then {"b": "with } brace", "c": [1, 2, 3]}"#;
        assert_eq!(
            largest_json_object(text),
            Some(r#"{"b": "with } brace", "c": [1, 2, 3]}"#)
        );
    }

    #[test]
    fn test_parse_skips_unclosed_leading_brace() {
        let text = format!("Output {{ follows: {}", VALID_OUTPUT);
        let set = parse_model_output(&text).unwrap();
        assert_eq!(set.flashcards.len(), 1);
        assert_eq!(set.video_analysis.main_topic, "Rust");
    }

    #[test]
    fn test_largest_object_closes_inside_unbalanced_prefix() {
        let text = r#"{ { {"a": 1} {"bb": 22}"#;
        assert_eq!(largest_json_object(text), Some(r#"{"bb": 22}"#));
    }

    #[test]
    fn test_parse_without_video_analysis() {
        let set = parse_model_output(
            r#"{"flashcards":[{"question":"q","options":{"A":"a"},"correct_answer":"A"}]}"#,
        )
        .unwrap();

        assert_eq!(set.flashcards.len(), 1);
        assert_eq!(set.video_analysis, VideoAnalysis::default());
    }

    #[test]
    fn test_validate_normalizes_answer_and_dedupes_themes() {
        let set = validate(parse_model_output(VALID_OUTPUT).unwrap(), true).unwrap();
        assert_eq!(set.flashcards[0].correct_answer, "A");
        assert_eq!(set.video_analysis.key_themes, vec!["ownership", "traits"]);
    }

    #[test]
    fn test_strict_validation_rejects_unknown_answer() {
        let mut set = parse_model_output(VALID_OUTPUT).unwrap();
        set.flashcards[0].correct_answer = "E".to_string();

        let err = validate(set.clone(), true).unwrap_err();
        assert!(matches!(err, FlashcardError::MalformedModelOutput(_)));

        let lenient = validate(set, false).unwrap();
        assert_eq!(lenient.flashcards[0].correct_answer, "E");
    }

    #[tokio::test]
    async fn test_generate_annotates_result() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|prompt| prompt.contains("[2s] b") && prompt.contains("exactly 10"))
            .times(1)
            .returning(|_| Ok(VALID_OUTPUT.to_string()));

        let entries = vec![entry("a", 0.0, 2.0), entry("b", 2.0, 3.0)];
        let result = pipeline_with(mock, true)
            .generate(&entries, "Title")
            .await
            .unwrap();

        assert_eq!(result.num_flashcards, 10);
        assert_eq!(result.video_duration, 5.0);
        assert_eq!(result.set.flashcards.len(), 1);
    }

    #[tokio::test]
    async fn test_long_video_requests_twenty_cards() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|prompt| prompt.contains("exactly 20"))
            .times(1)
            .returning(|_| Ok(VALID_OUTPUT.to_string()));

        let entries = vec![entry("intro", 0.0, 1.0), entry("outro", 1500.0, 1.0)];
        let result = pipeline_with(mock, true)
            .generate(&entries, "Long")
            .await
            .unwrap();

        assert_eq!(result.num_flashcards, 20);
        assert_eq!(result.video_duration, 1501.0);
    }

    #[tokio::test]
    async fn test_supplied_duration_overrides_computed() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(VALID_OUTPUT.to_string()));

        let entries = vec![entry("a", 0.0, 2.0)];
        let result = pipeline_with(mock, true)
            .generate_with_duration(&entries, "Title", Some(1800.0))
            .await
            .unwrap();

        assert_eq!(result.num_flashcards, 20);
        assert_eq!(result.video_duration, 1800.0);
    }

    #[tokio::test]
    async fn test_malformed_output_is_not_retried() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok("Sorry, I can't do that.".to_string()));

        let entries = vec![entry("a", 0.0, 2.0)];
        let err = pipeline_with(mock, true)
            .generate(&entries, "Title")
            .await
            .unwrap_err();

        assert!(matches!(err, FlashcardError::MalformedModelOutput(_)));
    }

    #[tokio::test]
    async fn test_empty_transcript_makes_no_call() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().never();

        let err = pipeline_with(mock, true)
            .generate(&[], "Title")
            .await
            .unwrap_err();

        assert!(matches!(err, FlashcardError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_generator_reports_capability() {
        let pipeline = FlashcardPipeline::disabled();
        assert!(!pipeline.is_enabled());

        let err = pipeline
            .generate(&[entry("a", 0.0, 1.0)], "Title")
            .await
            .unwrap_err();

        assert!(matches!(err, FlashcardError::CapabilityNotConfigured));
    }

    #[tokio::test]
    async fn test_generator_errors_propagate() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Err(FlashcardError::Timeout("deadline exceeded".to_string())));

        let err = pipeline_with(mock, true)
            .generate(&[entry("a", 0.0, 1.0)], "Title")
            .await
            .unwrap_err();

        assert!(matches!(err, FlashcardError::Timeout(_)));
    }
}
