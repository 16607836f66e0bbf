use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default arXiv AI-related categories searched when the user has not
/// picked their own set.
pub const DEFAULT_ARXIV_CATEGORIES: &[&str] = &[
    "cs.AI",   // Artificial Intelligence
    "cs.LG",   // Machine Learning
    "cs.CL",   // Computation and Language (NLP)
    "cs.CV",   // Computer Vision
    "cs.NE",   // Neural and Evolutionary Computing
    "cs.RO",   // Robotics
    "cs.IR",   // Information Retrieval
    "stat.ML", // Machine Learning (Statistics)
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Expand the topic into keywords and push them into the arXiv query
    Keyword,
    /// Pull everything in the date window, then coarse-filter by title
    #[default]
    Exhaustive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

impl ApiSettings {
    /// The configured key, falling back to the conventional environment
    /// variable so existing shell setups keep working.
    pub fn resolved_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var("OPENAI_API_KEY").unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub mode: SearchMode,

    /// arXiv categories to search
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Maximum parallel scoring workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum results per keyword-mode query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum papers pulled from the API in exhaustive mode
    #[serde(default = "default_exhaustive_max_results")]
    pub exhaustive_max_results: usize,

    /// Only papers scoring at or above this are shown (0-10)
    #[serde(default = "default_interest_threshold")]
    pub interest_threshold: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            categories: default_categories(),
            max_workers: default_max_workers(),
            max_results: default_max_results(),
            exhaustive_max_results: default_exhaustive_max_results(),
            interest_threshold: default_interest_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Maximum papers to display (None = unlimited)
    #[serde(default = "default_max_display")]
    pub max_display: Option<usize>,

    /// Generate a research overview above the results
    #[serde(default = "default_true")]
    pub auto_summary: bool,

    /// Papers included in the auto-summary
    #[serde(default = "default_summary_top_papers")]
    pub summary_top_papers: usize,

    /// Export results to a markdown file
    #[serde(default = "default_true")]
    pub save_results: bool,

    /// Record queries and feedback locally
    #[serde(default = "default_true")]
    pub save_to_local: bool,

    /// Output directory for exported results (default: ./outputs)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_display: default_max_display(),
            auto_summary: true,
            summary_top_papers: default_summary_top_papers(),
            save_results: true,
            save_to_local: true,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub display: DisplaySettings,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_categories() -> Vec<String> {
    DEFAULT_ARXIV_CATEGORIES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_max_workers() -> usize {
    32
}

fn default_max_results() -> usize {
    200
}

fn default_exhaustive_max_results() -> usize {
    5000
}

fn default_interest_threshold() -> f64 {
    5.0
}

fn default_max_display() -> Option<usize> {
    Some(20)
}

fn default_summary_top_papers() -> usize {
    10
}

fn default_true() -> bool {
    true
}
