use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClipsageError, Result};

/// Video container extensions accepted for uploads.
pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

/// A video file handed over by the user, as name plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedVideo {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedVideo {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a local file into an upload, keeping its file name.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| ClipsageError::UnsupportedVideoFormat {
                file_name: path.display().to_string(),
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }
}

/// What the user asked us to look at. Exactly one source per request.
#[derive(Debug, Clone, Default)]
pub enum InputSelection {
    UploadedVideo(UploadedVideo),
    YouTube(String),
    Website(String),
    #[default]
    None,
}

impl InputSelection {
    pub fn content_kind(&self) -> Option<ContentKind> {
        match self {
            InputSelection::UploadedVideo(_) | InputSelection::YouTube(_) => {
                Some(ContentKind::Video)
            }
            InputSelection::Website(_) => Some(ContentKind::Website),
            InputSelection::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Video,
    Website,
}

/// Processing state of a file on the remote media service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetState {
    Processing,
    #[serde(rename = "ACTIVE")]
    Ready,
    Failed,
    #[default]
    #[serde(rename = "STATE_UNSPECIFIED", other)]
    Unspecified,
}

/// Handle to a video uploaded to the remote media service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAsset {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: AssetState,
}

/// Content the agent is asked about; a video and website text never coexist.
#[derive(Debug, Clone)]
pub enum AnalysisContent {
    Video(RemoteAsset),
    WebsiteText(String),
}

impl AnalysisContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            AnalysisContent::Video(_) => ContentKind::Video,
            AnalysisContent::WebsiteText(_) => ContentKind::Website,
        }
    }
}

/// A non-empty user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisQuery(String);

impl AnalysisQuery {
    pub fn new(query: &str) -> Result<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ClipsageError::EmptyQuery);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub content: String,
    pub kind: ContentKind,
}
