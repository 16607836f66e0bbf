pub mod feedback;
pub mod scorer;

pub use feedback::{ParsedFeedback, PaperFeedback};
pub use scorer::InterestScorer;
