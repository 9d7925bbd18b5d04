use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("No opportunities closed in the last {0}")]
    EmptyResultSet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors that are reported to the triggering thread as a
    /// status message instead of aborting the batch.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::ChannelNotFound(_)
                | Error::EmptyResultSet(_)
                | Error::Delivery(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
