use paperscout_core::settings::config::SearchMode;

use crate::display;
use crate::interactive::InteractiveApp;

pub enum LocalCommandResult {
    Handled {
        msg: String,
    },

    /// A command to exit the app was detected
    Exit,

    /// The input was not a command and should run as a search query
    Unhandled,
}

pub fn handle_local_command(app: &InteractiveApp, input: &str) -> LocalCommandResult {
    let mut parts = input.trim().split_whitespace();
    let command = parts.next().unwrap_or_default();
    let argument = parts.next();

    match command {
        "/help" => LocalCommandResult::Handled {
            msg: display::HELP_TEXT.to_string(),
        },
        "/memory" => LocalCommandResult::Handled {
            msg: format!(
                "Preference memory:\n{}\n\nPending updates: {}",
                app.store.summary(),
                app.store.pending_count()
            ),
        },
        "/clear-memory" => match app.store.clear_memory() {
            Ok(()) => LocalCommandResult::Handled {
                msg: "Preference memory cleared".to_string(),
            },
            Err(error) => LocalCommandResult::Handled {
                msg: format!("Failed to clear memory: {error}"),
            },
        },
        "/settings" => {
            let settings = app.settings.settings();
            LocalCommandResult::Handled {
                msg: format!(
                    "Settings ({}):\n  model: {}\n  search mode: {:?}\n  categories: {}\n  \
                     max workers: {}\n  interest threshold: {}\n  language: {}",
                    app.settings.path().display(),
                    settings.api.model,
                    settings.search.mode,
                    settings.search.categories.join(", "),
                    settings.search.max_workers,
                    settings.search.interest_threshold,
                    app.store.language().as_deref().unwrap_or("en"),
                ),
            }
        }
        "/lang" => match argument {
            Some(lang @ ("en" | "zh")) => match app.store.set_language(lang) {
                Ok(()) => LocalCommandResult::Handled {
                    msg: format!("Language set to {lang}"),
                },
                Err(error) => LocalCommandResult::Handled {
                    msg: format!("Failed to save language: {error}"),
                },
            },
            _ => LocalCommandResult::Handled {
                msg: "Usage: /lang <en|zh>".to_string(),
            },
        },
        "/mode" => {
            let mode = match argument {
                Some("keyword") => Some(SearchMode::Keyword),
                Some("exhaustive") => Some(SearchMode::Exhaustive),
                _ => None,
            };
            match mode {
                Some(mode) => {
                    app.settings
                        .update_setting(|settings| settings.search.mode = mode);
                    let msg = match app.settings.save() {
                        Ok(()) => format!("Search mode set to {mode:?}"),
                        Err(error) => format!("Failed to save search mode: {error}"),
                    };
                    LocalCommandResult::Handled { msg }
                }
                None => LocalCommandResult::Handled {
                    msg: "Usage: /mode <keyword|exhaustive>".to_string(),
                },
            }
        }
        "/exit" | "/quit" => LocalCommandResult::Exit,
        _ if command.starts_with('/') => LocalCommandResult::Handled {
            msg: format!("Unknown command: {command} (try /help)"),
        },
        _ => LocalCommandResult::Unhandled,
    }
}
