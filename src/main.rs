//! Command-line entry point for aligned-reader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse arguments.
//! 3. Load [`AppConfig`] from disk (default on first run) and apply
//!    environment overrides.
//! 4. Dispatch the subcommand.  Only `create` builds the remote providers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use aligned_reader::{
    config::AppConfig,
    llm::{build_provider, PhraseBook},
    pipeline::{AlignmentGenerator, PassageService},
    playback::{current_source_index, target_highlights},
    speech::ElevenLabsSynthesizer,
    storage::{AlignmentStore, LocalStore},
};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(
    name = "aligned-reader",
    version,
    about = "Generate and align vocabulary reading passages"
)]
struct Cli {
    /// Settings file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate, speak, align and store a passage.
    Create {
        /// Vocabulary words to weave into the passage.
        words: Vec<String>,
        /// Also include every phrase from the phrase book.
        #[arg(long)]
        from_phrases: bool,
    },
    /// Print a stored passage with its alignment.
    Show { id: String },
    /// Write a stored passage's audio to a file.
    Audio { id: String, out: PathBuf },
    /// List stored passages, newest first.
    List,
    /// Print what is highlighted at a playback position.
    Highlight { id: String, seconds: f64 },
    /// Write the default settings file.
    InitConfig,
    /// Manage the phrase book.
    #[command(subcommand)]
    Phrase(PhraseCommand),
}

#[derive(Debug, Subcommand)]
enum PhraseCommand {
    Add {
        text: String,
        #[arg(long)]
        translation: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    List,
    Remove { id: Uuid },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&PathBuf>) -> AppConfig {
    let loaded = match path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        AppConfig::default()
    });
    config.apply_env_overrides();
    config
}

fn store(config: &AppConfig) -> Arc<dyn AlignmentStore> {
    Arc::new(LocalStore::new(config.storage.resolved_dir()))
}

fn build_service(config: &AppConfig) -> Result<PassageService> {
    let text = build_provider(&config.llm).context("building text provider")?;
    let speech = ElevenLabsSynthesizer::from_config(&config.speech)
        .context("building speech synthesizer")?;
    log::info!("Using {} for text, ElevenLabs for speech", text.name());

    let generator = AlignmentGenerator::new(text, Arc::new(speech), &config.generation);
    Ok(PassageService::new(generator, store(config)))
}

/// Cancel `token` on Ctrl-C so an in-flight generation stops promptly.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; cancelling");
            token.cancel();
        }
    });
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn create(config: &AppConfig, mut words: Vec<String>, from_phrases: bool) -> Result<()> {
    if from_phrases {
        let book = PhraseBook::load_or_default()?;
        words.extend(book.words());
    }
    if words.iter().all(|w| w.trim().is_empty()) {
        bail!("no vocabulary given; pass words or use --from-phrases");
    }

    let service = build_service(config)?;
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let record = service.create_aligned_passage(&words, &token).await?;
    println!("{}", record.id);
    println!("{}", record.passage_text);
    Ok(())
}

async fn show(config: &AppConfig, id: &str) -> Result<()> {
    let record = store(config)
        .retrieve(aligned_reader::storage::parse_id(id)?)
        .await?;
    println!("{} ({})", record.id, record.created_at.to_rfc3339());
    println!("{}\n", record.passage_text);

    let alignment = &record.alignment;
    for (index, timing) in alignment.word_timings().iter().enumerate() {
        let targets: Vec<&str> = alignment
            .targets_for(index)
            .unwrap_or_default()
            .iter()
            .filter_map(|&t| alignment.target_token(t))
            .collect();
        println!(
            "{index:>4}  {:>7.2}-{:<7.2} {:<20} {}",
            timing.start,
            timing.end,
            timing.word,
            targets.join(" ")
        );
    }
    Ok(())
}

async fn audio(config: &AppConfig, id: &str, out: &PathBuf) -> Result<()> {
    let bytes = store(config)
        .audio(aligned_reader::storage::parse_id(id)?)
        .await?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    println!("{} bytes → {}", bytes.len(), out.display());
    Ok(())
}

async fn list(config: &AppConfig) -> Result<()> {
    for summary in store(config).list().await? {
        let preview: String = summary.passage_text.chars().take(60).collect();
        println!(
            "{}  {}  {preview}",
            summary.id,
            summary.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn highlight(config: &AppConfig, id: &str, seconds: f64) -> Result<()> {
    let record = store(config)
        .retrieve(aligned_reader::storage::parse_id(id)?)
        .await?;
    let alignment = &record.alignment;

    let index = current_source_index(alignment.word_timings(), seconds);
    let Some(i) = index else {
        println!("(nothing highlighted at {seconds:.2}s)");
        return Ok(());
    };

    let targets: Vec<&str> = target_highlights(alignment, index)
        .into_iter()
        .filter_map(|t| alignment.target_token(t))
        .collect();
    let word = alignment
        .word_timings()
        .get(i)
        .map(|w| w.word.as_str())
        .unwrap_or_default();
    println!("{i}: {word} → {}", targets.join(" "));
    Ok(())
}

fn init_config(path: Option<&PathBuf>) -> Result<()> {
    let config = AppConfig::default();
    match path {
        Some(p) => {
            config.save_to(p)?;
            println!("Wrote {}", p.display());
        }
        None => {
            config.save()?;
            println!("Wrote default settings");
        }
    }
    Ok(())
}

fn phrase(command: PhraseCommand) -> Result<()> {
    let mut book = PhraseBook::load_or_default()?;
    match command {
        PhraseCommand::Add {
            text,
            translation,
            notes,
        } => {
            let entry = book.add(&text, translation, notes)?;
            println!("{}", entry.id);
        }
        PhraseCommand::List => {
            for entry in book.list() {
                let translation = entry.translation.as_deref().unwrap_or("");
                println!("{}  {:<30} {translation}", entry.id, entry.text);
            }
        }
        PhraseCommand::Remove { id } => {
            book.remove(id)?;
            println!("Removed {id}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Command::Create {
            words,
            from_phrases,
        } => create(&config, words, from_phrases).await,
        Command::Show { id } => show(&config, &id).await,
        Command::Audio { id, out } => audio(&config, &id, &out).await,
        Command::List => list(&config).await,
        Command::Highlight { id, seconds } => highlight(&config, &id, seconds).await,
        Command::InitConfig => init_config(cli.config.as_ref()),
        Command::Phrase(command) => phrase(command),
    }
}
