use thiserror::Error;

/// Failure families reported at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Acquisition,
    Extraction,
    RemoteService,
    Validation,
    Io,
}

#[derive(Error, Debug)]
pub enum ClipsageError {
    #[error("Failed to acquire video from {input}: {reason}")]
    VideoAcquisition { input: String, reason: String },

    #[error("Could not extract any content from {url}. Try a different input.")]
    WebsiteUnavailable { url: String },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Remote service responded with {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Invalid API response: {reason}")]
    InvalidApiResponse { reason: String },

    #[error("Remote processing failed for {name}")]
    AssetFailed { name: String },

    #[error("Remote asset {name} still not ready after {attempts} status checks")]
    AssetTimedOut { name: String, attempts: u32 },

    #[error("Please upload a video file, provide a YouTube URL, or enter a website URL.")]
    MissingInput,

    #[error("Please enter your query.")]
    EmptyQuery,

    #[error("Unsupported video format: {file_name} (expected mp4, mov or avi)")]
    UnsupportedVideoFormat { file_name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClipsageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClipsageError::VideoAcquisition { .. } => ErrorKind::Acquisition,
            ClipsageError::WebsiteUnavailable { .. } => ErrorKind::Extraction,
            ClipsageError::MissingApiKey { .. }
            | ClipsageError::Api(_)
            | ClipsageError::RemoteStatus { .. }
            | ClipsageError::InvalidApiResponse { .. }
            | ClipsageError::AssetFailed { .. }
            | ClipsageError::AssetTimedOut { .. } => ErrorKind::RemoteService,
            ClipsageError::MissingInput
            | ClipsageError::EmptyQuery
            | ClipsageError::UnsupportedVideoFormat { .. } => ErrorKind::Validation,
            ClipsageError::Io(_) | ClipsageError::Json(_) => ErrorKind::Io,
        }
    }

    /// Validation failures are shown as warnings rather than errors.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T> = std::result::Result<T, ClipsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_family() {
        let acquisition = ClipsageError::VideoAcquisition {
            input: "https://youtu.be/x".into(),
            reason: "boom".into(),
        };
        assert_eq!(acquisition.kind(), ErrorKind::Acquisition);
        assert_eq!(
            ClipsageError::WebsiteUnavailable { url: "u".into() }.kind(),
            ErrorKind::Extraction
        );
        assert_eq!(
            ClipsageError::AssetTimedOut {
                name: "files/a".into(),
                attempts: 3
            }
            .kind(),
            ErrorKind::RemoteService
        );
        assert!(ClipsageError::EmptyQuery.is_validation());
        assert!(ClipsageError::MissingInput.is_validation());
        assert!(!acquisition.is_validation());
    }

    #[test]
    fn acquisition_message_carries_cause() {
        let err = ClipsageError::VideoAcquisition {
            input: "https://youtu.be/x".into(),
            reason: "ERROR: Video unavailable".into(),
        };
        let message = err.to_string();
        assert!(message.contains("https://youtu.be/x"));
        assert!(message.contains("Video unavailable"));
    }
}
