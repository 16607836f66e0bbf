use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single arXiv paper, with interest-scoring outputs filled in after the
/// scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub arxiv_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub primary_category: String,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub pdf_url: String,
    pub arxiv_url: String,

    #[serde(default)]
    pub interest_score: f64,
    #[serde(default)]
    pub interest_reason: String,
}

impl Paper {
    /// The more recent of the published and updated dates. Listings are
    /// filtered on this so recently-revised papers still show up.
    pub fn relevant_date(&self) -> DateTime<Utc> {
        self.published.max(self.updated)
    }

    pub fn short_summary(&self) -> String {
        let mut authors = self.authors.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        if self.authors.len() > 3 {
            authors.push_str(&format!(" et al. ({} authors)", self.authors.len()));
        }
        format!(
            "[{}] {}\n  Authors: {}\n  Categories: {}",
            self.arxiv_id,
            self.title,
            authors,
            self.categories.join(", ")
        )
    }
}
