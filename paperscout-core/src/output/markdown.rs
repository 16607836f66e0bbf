//! Markdown export of scored search results.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::arxiv::paper::Paper;

/// Write the scored results to `results_<topic>_<timestamp>.md` under the
/// output directory, returning the path of the written file.
pub fn export_results(
    output_dir: &Path,
    papers: &[Paper],
    topic: Option<&str>,
    summary: Option<&str>,
) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("results_{}_{timestamp}.md", sanitize(topic.unwrap_or("general")));
    let filepath = output_dir.join(filename);

    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;

    let content = render(papers, topic, summary);
    fs::write(&filepath, content)
        .with_context(|| format!("Failed to write results file: {}", filepath.display()))?;

    Ok(filepath)
}

fn render(papers: &[Paper], topic: Option<&str>, summary: Option<&str>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Paper Search Results\n");
    let _ = writeln!(
        out,
        "- **Date**: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "- **Topic**: {}", topic.unwrap_or("General"));
    let _ = writeln!(out, "- **Count**: {}\n", papers.len());

    if let Some(summary) = summary {
        let _ = writeln!(out, "---\n");
        let _ = writeln!(out, "## Research Summary\n");
        let _ = writeln!(out, "{summary}\n");
    }

    let _ = writeln!(out, "---\n");

    for (i, paper) in papers.iter().enumerate() {
        let _ = writeln!(out, "## {}. {}\n", i + 1, paper.title);
        let _ = writeln!(out, "- **Score**: {:.1}", paper.interest_score);
        let _ = writeln!(out, "- **ArXiv ID**: {}", paper.arxiv_id);
        let _ = writeln!(out, "- **Published**: {}", paper.published.format("%Y-%m-%d"));
        let _ = writeln!(out, "- **Authors**: {}", paper.authors.join(", "));
        let _ = writeln!(out, "- **Categories**: {}", paper.categories.join(", "));
        let _ = writeln!(out, "- **Link**: {}\n", paper.arxiv_url);
        let _ = writeln!(out, "### Score Reason\n{}\n", paper.interest_reason);
        let _ = writeln!(out, "### Abstract\n{}\n", paper.abstract_text);
        let _ = writeln!(out, "---\n");
    }

    out
}

fn sanitize(topic: &str) -> String {
    topic
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn paper() -> Paper {
        Paper {
            arxiv_id: "2401.00001v1".to_string(),
            title: "A Paper".to_string(),
            abstract_text: "The abstract.".to_string(),
            authors: vec!["Ada".to_string(), "Alan".to_string()],
            categories: vec!["cs.AI".to_string()],
            primary_category: "cs.AI".to_string(),
            published: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            pdf_url: String::new(),
            arxiv_url: "http://arxiv.org/abs/2401.00001v1".to_string(),
            interest_score: 8.25,
            interest_reason: "Relevant.".to_string(),
        }
    }

    #[test]
    fn test_export_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = export_results(
            temp_dir.path(),
            &[paper()],
            Some("RAG systems"),
            Some("A summary."),
        )
        .unwrap();

        assert!(path.exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("- **Topic**: RAG systems"));
        assert!(content.contains("## Research Summary"));
        assert!(content.contains("## 1. A Paper"));
        assert!(content.contains("- **Score**: 8.2"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("results_RAG_systems_"));
    }

    #[test]
    fn test_export_without_summary_or_topic() {
        let temp_dir = TempDir::new().unwrap();
        let path = export_results(temp_dir.path(), &[paper()], None, None).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("- **Topic**: General"));
        assert!(!content.contains("Research Summary"));
    }

    #[test]
    fn test_sanitize_topic() {
        assert_eq!(sanitize("RAG: a survey!"), "RAG__a_survey_");
    }
}
