use anyhow::Result;
use std::fmt::Write;

use crate::sources::Transcript;
use crate::utils::{format_clock, format_subtitle_time};

pub fn format_as_text(transcript: &Transcript, include_timestamps: bool) -> String {
    if !include_timestamps {
        return transcript
            .entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
    }

    transcript
        .entries
        .iter()
        .map(|e| format!("[{}] {}", format_clock(e.start), e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_as_json(transcript: &Transcript) -> Result<String> {
    Ok(serde_json::to_string_pretty(transcript)?)
}

pub fn format_as_srt(transcript: &Transcript) -> String {
    let mut out = String::new();

    for (index, entry) in transcript.entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}\n",
            index + 1,
            format_subtitle_time(entry.start, ','),
            format_subtitle_time(entry.start + entry.duration, ','),
            entry.text
        );
    }

    out
}

pub fn format_as_vtt(transcript: &Transcript) -> String {
    let mut out = String::from("WEBVTT\n\n");

    for entry in &transcript.entries {
        let _ = writeln!(
            out,
            "{} --> {}\n{}\n",
            format_subtitle_time(entry.start, '.'),
            format_subtitle_time(entry.start + entry.duration, '.'),
            entry.text
        );
    }

    out
}
