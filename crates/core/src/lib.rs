//! Clipsage Core Library
//!
//! Acquires a video (upload or YouTube) or website text, hands it to a hosted
//! multimodal model together with a user question, and returns the answer.

pub mod acquire;
pub mod agent;
pub mod error;
pub mod extract;
pub mod format;
pub mod media;
pub mod pipeline;
pub mod provider;
pub mod types;
pub mod workspace;

pub use acquire::{VideoAcquirer, VideoDownloader, YtDlpDownloader, upload_file_name};
pub use agent::{AgentBackend, AgentConfig, AgentRequest, Analyzer, GeminiAgent};
pub use error::{ClipsageError, ErrorKind, Result};
pub use extract::{TextExtractor, WebsiteExtractor, html_to_text};
pub use format::{format_duration, format_result_readable, format_size, save_result};
pub use media::{Backoff, MediaService, PollPolicy, ReadinessPoller};
pub use pipeline::{AnalysisRequest, Pipeline, Stage, StageUpdate};
pub use provider::{GeminiClient, ProviderConfig};
pub use types::{
    AnalysisContent, AnalysisQuery, AnalysisResult, AssetState, ContentKind, InputSelection,
    RemoteAsset, UploadedVideo,
};
pub use workspace::AcquiredVideo;
