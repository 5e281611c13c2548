use thiserror::Error;

/// Reasons a single operator page could not be read.
///
/// These never abort a run; the message ends up in the sheet instead.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("page load of {url} timed out after {secs}s")]
    PageLoadTimeout { url: String, secs: u64 },

    #[error("timed out after {secs}s waiting for `{selector}`")]
    LandmarkTimeout { selector: String, secs: u64 },

    #[error("landmark `{selector}` not found in page")]
    MissingLandmark { selector: String },

    #[error("browser error: {0}")]
    Browser(String),
}
