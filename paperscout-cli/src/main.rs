use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod interactive;
mod prefs;
mod search;

use paperscout_core::ai::gemini::GeminiProvider;
use paperscout_core::ai::provider::CompletionProvider;
use paperscout_core::preferences::file::PreferenceFile;
use paperscout_core::preferences::store::PreferenceStore;
use paperscout_core::settings::SettingsManager;

use crate::interactive::InteractiveApp;

#[derive(Parser, Debug)]
#[command(name = "paperscout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PaperScout - arXiv paper assistant with preference memory")]
struct Args {
    /// Load settings from a specific file
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive session (default)
    Interactive,

    /// One-shot search
    Search {
        /// Time range, e.g. "last week" or "from 2024-01-01 to 2024-01-31"
        #[arg(short = 't', long)]
        time: String,

        /// Research topic to search for
        #[arg(short = 'T', long)]
        topic: Option<String>,

        /// Search mode: keyword or exhaustive
        #[arg(long)]
        mode: Option<String>,
    },

    /// Manage preferences and the preference memory
    Preferences {
        /// Show current settings and memory status
        #[arg(long)]
        show: bool,

        /// Show the preference memory text
        #[arg(long)]
        show_memory: bool,

        /// Queue a memory update and merge it now
        #[arg(long, value_name = "TEXT")]
        add_memory: Option<String>,

        /// Clear the preference memory
        #[arg(long)]
        clear_memory: bool,

        /// Set the UI/response language (en or zh)
        #[arg(long, value_name = "LANG")]
        set_lang: Option<String>,
    },
}

fn main() -> Result<()> {
    setup_tracing()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let settings = match args.settings {
        Some(path) => SettingsManager::from_path(path)?,
        None => SettingsManager::new()?,
    };

    info!(command = ?args.command, "CLI startup");

    match args.command {
        None | Some(Command::Interactive) => {
            let mut app = InteractiveApp::new(settings)?;
            app.run().await
        }
        Some(Command::Search { time, topic, mode }) => {
            search::run_search(settings, time, topic, mode).await
        }
        Some(Command::Preferences {
            show,
            show_memory,
            add_memory,
            clear_memory,
            set_lang,
        }) => {
            prefs::run_preferences(settings, show, show_memory, add_memory, clear_memory, set_lang)
                .await
        }
    }
}

/// Build the completion provider from configured credentials. A missing key
/// is not an error here; it surfaces as an auth error on the first call so
/// offline operations keep working.
pub(crate) fn build_provider(settings: &SettingsManager) -> Arc<dyn CompletionProvider> {
    let api = settings.settings().api;
    Arc::new(GeminiProvider::new(api.resolved_key(), api.base_url, api.model))
}

pub(crate) fn build_store(provider: Arc<dyn CompletionProvider>) -> Result<PreferenceStore> {
    let file = PreferenceFile::new(PreferenceFile::default_path()?);
    Ok(PreferenceStore::new(file, provider))
}

/// Standard hint printed when the completion capability rejects our
/// credentials mid-operation.
pub(crate) fn print_auth_hint(settings: &SettingsManager) {
    display::print_error(&format!(
        "Authentication failed. Set api.api_key in {} or export OPENAI_API_KEY",
        settings.path().display()
    ));
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create trace directory in user's home
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    let trace_dir = PathBuf::from(home).join(".paperscout").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("paperscout.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    // Setup tracing subscriber with file output
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(EnvFilter::new("info"))
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
