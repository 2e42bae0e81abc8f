// src/error.rs

/// Failures of the scrape → extract → reshape → clean pipeline.
///
/// "Marker not yet present" is not an error: the fetcher retries it
/// internally and only surfaces `RetriesExhausted` when a cap is set.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Unreachable host, malformed URL, or a navigation that failed outright.
    #[error("fatal fetch error for {url}: {reason}")]
    FatalFetch { url: String, reason: String },

    #[error("page {url} not ready after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    /// The expected row/column structure is absent from the markup.
    #[error("extraction shape error: {0}")]
    ExtractionShape(String),

    /// A residual value survived cleaning but is not numeric.
    #[error("cannot coerce {field} value {value:?} for {company}/{breakdown}")]
    Coercion {
        company: String,
        breakdown: String,
        field: &'static str,
        value: String,
    },

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// True for errors that come out of the fetch stage.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::FatalFetch { .. } | Self::RetriesExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
