use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info};

use crate::arxiv::feed::parse_feed;
use crate::arxiv::paper::Paper;

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// Page size for paginated listing requests
const PAGE_SIZE: usize = 200;

/// In exhaustive mode the submitted-date ordering is not perfect; tolerate
/// this many out-of-window papers before concluding the window is done.
const TOO_OLD_TOLERANCE: usize = 100;

/// Extended category set for exhaustive search (broader but manageable)
pub const EXTENDED_CATEGORIES: &[&str] = &[
    // Core AI/ML
    "cs.AI", "cs.LG", "cs.CL", "cs.CV", "cs.NE", "cs.RO", "cs.IR",
    // Other CS
    "cs.HC", "cs.MA", "cs.CR", "cs.DC", "cs.SE", "cs.DB", "cs.SI",
    // Statistics & Math
    "stat.ML", "stat.TH", "stat.ME", "math.OC", "math.ST",
    // Electrical Engineering
    "eess.AS", "eess.IV", "eess.SP", "eess.SY",
    // Physics (quantum computing related)
    "quant-ph",
];

pub type ProgressFn = dyn Fn(usize) + Send + Sync;

/// Diagnostics for an exhaustive fetch, surfaced when a window comes back
/// suspiciously empty.
#[derive(Debug, Default)]
pub struct FetchDiagnostics {
    pub raw_count: usize,
    pub too_old_count: usize,
    pub too_new_count: usize,
    pub first_paper_date: Option<DateTime<Utc>>,
    pub last_paper_date: Option<DateTime<Utc>>,
    pub query: String,
}

/// arXiv paper fetcher over the public query API.
pub struct ArxivFetcher {
    client: Client,
    base_url: String,
    categories: Vec<String>,
}

impl ArxivFetcher {
    pub fn new(categories: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: ARXIV_API_URL.to_string(),
            categories,
        })
    }

    /// Build the arXiv search query: a category disjunction, optionally
    /// AND-ed with quoted title/abstract keyword matches.
    fn build_query(&self, keywords: Option<&[String]>, extended: bool) -> String {
        let categories: Vec<&str> = if extended {
            EXTENDED_CATEGORIES.to_vec()
        } else {
            self.categories.iter().map(String::as_str).collect()
        };

        let category_query = categories
            .iter()
            .map(|cat| format!("cat:{cat}"))
            .collect::<Vec<_>>()
            .join(" OR ");

        match keywords {
            Some(keywords) if !keywords.is_empty() => {
                let keyword_query = keywords
                    .iter()
                    .map(|kw| format!("(ti:\"{kw}\" OR abs:\"{kw}\")"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("({category_query}) AND ({keyword_query})")
            }
            _ => format!("({category_query})"),
        }
    }

    async fn fetch_page(&self, query: &str, start: usize, page_size: usize) -> Result<Vec<Paper>> {
        let url = format!(
            "{}?search_query={}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.base_url,
            urlencoding::encode(query),
            start,
            page_size
        );
        debug!(start, page_size, "Fetching arXiv page");

        let response = self.client.get(&url).send().await.context(
            "Failed to connect to the arXiv API. Please check your internet connection",
        )?;

        let status = response.status();
        if !status.is_success() {
            bail!("arXiv API returned HTTP {status}. This may be temporary; try again in a few minutes");
        }

        let body = response
            .text()
            .await
            .context("Failed to read arXiv API response")?;

        parse_feed(&body)
    }

    /// Fetch papers whose relevant date falls inside `[start_date, end_date]`,
    /// newest first. Listing is submitted-date ordered, so the fetch stops as
    /// soon as results fall behind the window start.
    pub async fn fetch_window(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        max_results: usize,
        keywords: Option<&[String]>,
        extended: bool,
        on_progress: Option<&ProgressFn>,
    ) -> Result<Vec<Paper>> {
        let query = self.build_query(keywords, extended);
        let mut papers = Vec::new();
        let mut raw_count = 0;

        'pages: for start in (0..max_results).step_by(PAGE_SIZE) {
            let page_size = PAGE_SIZE.min(max_results - start);
            let page = self.fetch_page(&query, start, page_size).await?;
            let page_len = page.len();

            for paper in page {
                raw_count += 1;
                if let Some(progress) = on_progress {
                    progress(raw_count);
                }

                let relevant = paper.relevant_date();
                if relevant < start_date {
                    break 'pages;
                }
                if relevant > end_date {
                    continue;
                }
                papers.push(paper);
            }

            if page_len < page_size {
                break;
            }
        }

        info!(count = papers.len(), raw_count, "Fetched arXiv window");
        Ok(papers)
    }

    /// Exhaustive fetch: everything in the window, with diagnostics. Sorting
    /// by submitted date is not exact, so a tolerance of out-of-window
    /// papers is allowed before stopping.
    pub async fn fetch_all(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        extended: bool,
        max_results: usize,
        on_progress: Option<&ProgressFn>,
    ) -> Result<(Vec<Paper>, FetchDiagnostics)> {
        let query = self.build_query(None, extended);
        let mut diag = FetchDiagnostics {
            query: query.clone(),
            ..Default::default()
        };
        let mut papers = Vec::new();

        'pages: for start in (0..max_results).step_by(PAGE_SIZE) {
            let page_size = PAGE_SIZE.min(max_results - start);
            let page = self.fetch_page(&query, start, page_size).await?;
            let page_len = page.len();

            for paper in page {
                diag.raw_count += 1;
                if let Some(progress) = on_progress {
                    progress(diag.raw_count);
                }

                let relevant = paper.relevant_date();
                if diag.first_paper_date.is_none() {
                    diag.first_paper_date = Some(relevant);
                }
                diag.last_paper_date = Some(relevant);

                if relevant < start_date {
                    diag.too_old_count += 1;
                    if diag.too_old_count > TOO_OLD_TOLERANCE {
                        break 'pages;
                    }
                    continue;
                }
                if relevant > end_date {
                    diag.too_new_count += 1;
                    continue;
                }
                papers.push(paper);
            }

            if page_len < page_size {
                break;
            }
        }

        info!(
            count = papers.len(),
            raw = diag.raw_count,
            too_old = diag.too_old_count,
            too_new = diag.too_new_count,
            "Exhaustive arXiv fetch complete"
        );
        Ok((papers, diag))
    }
}
