use thiserror::Error;

/// Failure categories for the text-completion capability. Everything except
/// `Auth` is transient: callers requeue or degrade and a later attempt may
/// succeed without operator intervention.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Authentication failed: {0}")]
    Auth(anyhow::Error),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(anyhow::Error),

    #[error("Network error: {0}")]
    Network(anyhow::Error),

    #[error("Server error: {0}")]
    Server(anyhow::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(anyhow::Error),
}

impl CompletionError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn is_transient(&self) -> bool {
        !self.is_auth()
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(source: serde_json::Error) -> Self {
        Self::InvalidResponse(anyhow::anyhow!(source))
    }
}
