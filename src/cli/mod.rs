use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hermes",
    about = "Hermes - YouTube transcripts with client-side fallback and AI flashcards",
    version,
    long_about = "Fetches YouTube transcripts server-side, hands out a browser fetch routine when YouTube blocks the server, and turns transcripts into multiple-choice flashcards with a generative-text provider."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the transcript HTTP server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,

        /// HTML viewer served at / (overrides config)
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,
    },

    /// Fetch the transcript of a video
    Transcript {
        /// YouTube URL or video id
        #[arg(value_name = "URL")]
        url: String,

        /// Preferred language codes, in order (defaults to config)
        #[arg(short, long = "lang", value_name = "LANG")]
        languages: Vec<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include timestamps in text output (srt/vtt formats always include timestamps)
        #[arg(long)]
        timestamps: bool,
    },

    /// Fetch a transcript and generate quiz flashcards from it
    Flashcards {
        /// YouTube URL or video id
        #[arg(value_name = "URL")]
        url: String,

        /// Preferred language codes, in order (defaults to config)
        #[arg(short, long = "lang", value_name = "LANG")]
        languages: Vec<String>,

        /// Output file path for the JSON result (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the browser script used for client-side fetching
    FetcherCode,

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a default config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with timestamps
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}
