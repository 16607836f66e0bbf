//! The `preferences` subcommand: inspect and edit the preference memory
//! without entering the interactive loop.

use anyhow::Result;

use paperscout_core::preferences::store::MergeOutcome;
use paperscout_core::settings::SettingsManager;

use crate::display;

pub async fn run_preferences(
    settings: SettingsManager,
    show: bool,
    show_memory: bool,
    add_memory: Option<String>,
    clear_memory: bool,
    set_lang: Option<String>,
) -> Result<()> {
    let provider = crate::build_provider(&settings);
    let store = crate::build_store(provider)?;
    let mut acted = false;

    if let Some(language) = set_lang {
        match language.as_str() {
            "en" | "zh" => {
                store.set_language(&language)?;
                println!("Language set to {language}");
            }
            other => display::print_error(&format!("Unsupported language: {other} (en|zh)")),
        }
        acted = true;
    }

    if clear_memory {
        store.clear_memory()?;
        println!("Preference memory cleared");
        acted = true;
    }

    if let Some(text) = add_memory {
        // Foreground merge: the non-interactive path has no background to
        // defer to, so surface the outcome directly.
        store.enqueue_update(&text)?;
        match store.merge_now().await {
            Ok(MergeOutcome::Merged { notification }) => {
                println!("Memory updated");
                if let Some(notification) = notification {
                    println!("{notification}");
                }
            }
            Ok(MergeOutcome::NoUpdates) => {}
            Err(error) if error.is_auth() => {
                crate::print_auth_hint(&settings);
                println!("The update is queued and will merge once credentials work.");
            }
            Err(error) => {
                display::print_error(&format!("Merge failed: {error}"));
                println!("The update is queued and will merge on the next attempt.");
            }
        }
        acted = true;
    }

    if show_memory || !acted || show {
        let snapshot = store.snapshot();
        println!("Preference memory:\n{}", store.summary());
        if !snapshot.pending_updates.is_empty() {
            println!("\nPending updates: {}", snapshot.pending_updates.len());
        }

        if show {
            let config = settings.settings();
            println!("\nSettings ({}):", settings.path().display());
            println!("  model: {}", config.api.model);
            println!("  search mode: {:?}", config.search.mode);
            println!("  categories: {}", config.search.categories.join(", "));
            println!("  language: {}", snapshot.language.as_deref().unwrap_or("en"));
            println!(
                "  query history: {} entries, feedback history: {} entries",
                snapshot.query_history.len(),
                snapshot.feedback_history.len()
            );
            println!("  last updated: {}", snapshot.last_updated);
        }
    }

    Ok(())
}
