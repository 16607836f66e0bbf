pub mod ai;
pub mod arxiv;
pub mod output;
pub mod preferences;
pub mod query;
pub mod scoring;
pub mod settings;

// Public library API - if you are using paperscout as a library, I will aim
// to keep these types more stable (but everything is public so go nuts).
pub use ai::provider::CompletionProvider;
pub use arxiv::paper::Paper;
pub use preferences::store::PreferenceStore;
pub use settings::{Settings, SettingsManager};
