use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hermes::cli::{Cli, Commands};
use hermes::config::Config;
use hermes::server::{self, AppState};
use hermes::sources::delegated::{usage_example, FETCHER_SCRIPT};
use hermes::sources::FetchOutcome;
use hermes::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "hermes=debug,tower_http=debug" } else { "hermes=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Serve { host, port, html } => {
            let mut config = Config::load().await?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if html.is_some() {
                config.server.html_path = html;
            }

            server::run(&config).await?;
        }
        Commands::Transcript {
            url,
            languages,
            output,
            format,
            timestamps,
        } => {
            let config = Config::load().await?;
            let state = AppState::from_config(&config)?;

            let progress = spinner(cli.quiet, "Fetching transcript...");
            let outcome = state.orchestrator.fetch(&url, &languages).await;
            progress.finish_and_clear();

            let transcript = match outcome {
                FetchOutcome::Success(transcript) => transcript,
                other => return report_unfetched(other),
            };

            match output {
                Some(path) => {
                    output::save_to_file(&transcript, &path, &format, timestamps).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&transcript, &format, timestamps)?;
                }
            }
        }
        Commands::Flashcards {
            url,
            languages,
            output,
        } => {
            let config = Config::load().await?;
            let state = AppState::from_config(&config)?;
            generate_flashcards(&state, &url, &languages, output.as_deref(), cli.quiet).await?;
        }
        Commands::FetcherCode => {
            println!("{}", FETCHER_SCRIPT);
            println!("// Usage:");
            for line in usage_example(&["en".to_string()]).lines() {
                println!("// {}", line);
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Default configuration written to: {}", path.display());
            }
            if show || !init {
                Config::load().await?.display();
                println!("  File: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

async fn generate_flashcards(
    state: &AppState,
    url: &str,
    languages: &[String],
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let pipeline = &state.flashcards;
    if !pipeline.is_enabled() {
        anyhow::bail!(hermes::FlashcardError::CapabilityNotConfigured);
    }

    let progress = spinner(quiet, "Fetching transcript...");
    let outcome = state.orchestrator.fetch(url, languages).await;

    let transcript = match outcome {
        FetchOutcome::Success(transcript) => transcript,
        other => {
            progress.finish_and_clear();
            return report_unfetched(other);
        }
    };

    let metadata = state.orchestrator.metadata_for(&transcript.video_id).await;

    progress.set_message(format!(
        "Generating flashcards for \"{}\" ({})...",
        metadata.title,
        transcript
            .duration()
            .map(utils::format_duration)
            .unwrap_or_else(|| "empty".to_string())
    ));
    let result = pipeline.generate(&transcript.entries, &metadata.title).await;
    progress.finish_and_clear();

    let result = result?;
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize flashcards")?;

    match output {
        Some(path) => {
            fs_err::write(path, json)?;
            println!(
                "{} {} flashcards saved to: {}",
                style("✓").green(),
                result.set.flashcards.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Explain a delegation or failure and turn it into a non-zero exit
fn report_unfetched(outcome: FetchOutcome) -> Result<()> {
    match outcome {
        FetchOutcome::NeedsClientFetch { video_id, reason, .. } => {
            eprintln!("{} {}", style("⚠").yellow(), reason);
            eprintln!(
                "   Run `hermes fetcher-code` and execute the script in a browser to fetch {} from your own network.",
                video_id
            );
            anyhow::bail!("Transcript for {} must be fetched client-side", video_id)
        }
        FetchOutcome::Failure(err) => {
            eprintln!("{} {} ({})", style("✗").red(), err, err.kind);
            Err(err.into())
        }
        FetchOutcome::Success(_) => Ok(()),
    }
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        progress.set_style(style);
    }
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}
