pub mod feed;
pub mod fetcher;
pub mod paper;

pub use fetcher::{ArxivFetcher, FetchDiagnostics};
pub use paper::Paper;
