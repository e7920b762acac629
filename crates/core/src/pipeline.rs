use std::sync::Arc;

use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    acquire::VideoAcquirer,
    agent::Analyzer,
    error::{ClipsageError, Result},
    extract::TextExtractor,
    media::{MediaService, ReadinessPoller},
    types::{AnalysisContent, AnalysisQuery, AnalysisResult, InputSelection},
    workspace::AcquiredVideo,
};

/// A single user request: one input source and one question.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub selection: InputSelection,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AcquiringVideo,
    ExtractingWebsite,
    UploadingVideo,
    Analyzing,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::AcquiringVideo => "Acquiring video",
            Stage::ExtractingWebsite => "Extracting website text",
            Stage::UploadingVideo => "Uploading and processing video",
            Stage::Analyzing => "Analyzing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageUpdate {
    Started(Stage),
    /// Finished, with a short human-readable detail.
    Finished(Stage, String),
}

pub type ProgressFn<'a> = &'a mut (dyn FnMut(StageUpdate) + Send);

/// Request handler sequencing acquisition, upload, and analysis.
#[derive(Clone)]
pub struct Pipeline {
    acquirer: VideoAcquirer,
    extractor: Arc<dyn TextExtractor>,
    media: Arc<dyn MediaService>,
    poller: ReadinessPoller,
    analyzer: Analyzer,
}

impl Pipeline {
    pub fn new(
        acquirer: VideoAcquirer,
        extractor: Arc<dyn TextExtractor>,
        media: Arc<dyn MediaService>,
        poller: ReadinessPoller,
        analyzer: Analyzer,
    ) -> Self {
        Self {
            acquirer,
            extractor,
            media,
            poller,
            analyzer,
        }
    }

    pub async fn handle(
        &self,
        request: AnalysisRequest,
        progress: ProgressFn<'_>,
    ) -> Result<AnalysisResult> {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            kind = ?request.selection.content_kind()
        );
        self.handle_inner(request, progress).instrument(span).await
    }

    async fn handle_inner(
        &self,
        request: AnalysisRequest,
        progress: ProgressFn<'_>,
    ) -> Result<AnalysisResult> {
        // Input first, then the question; nothing is fetched until both pass.
        if matches!(request.selection, InputSelection::None) {
            return Err(ClipsageError::MissingInput);
        }
        AnalysisQuery::new(&request.query)?;

        match request.selection {
            InputSelection::None => Err(ClipsageError::MissingInput),
            InputSelection::UploadedVideo(upload) => {
                progress(StageUpdate::Started(Stage::AcquiringVideo));
                let video = self.acquirer.acquire_upload(&upload).await?;
                progress(StageUpdate::Finished(
                    Stage::AcquiringVideo,
                    video.file_name(),
                ));
                self.analyze_video(video, &request.query, progress).await
            }
            InputSelection::YouTube(url) => {
                progress(StageUpdate::Started(Stage::AcquiringVideo));
                let video = self.acquirer.acquire_youtube(&url).await?;
                progress(StageUpdate::Finished(
                    Stage::AcquiringVideo,
                    video.file_name(),
                ));
                self.analyze_video(video, &request.query, progress).await
            }
            InputSelection::Website(url) => {
                progress(StageUpdate::Started(Stage::ExtractingWebsite));
                let text = self
                    .extractor
                    .extract(&url)
                    .await
                    .ok_or_else(|| ClipsageError::WebsiteUnavailable { url: url.clone() })?;
                progress(StageUpdate::Finished(
                    Stage::ExtractingWebsite,
                    format!("{} characters", text.chars().count()),
                ));

                self.run_analysis(&request.query, AnalysisContent::WebsiteText(text), progress)
                    .await
            }
        }
    }

    /// Upload and analyze, then discard the local file whatever happened.
    async fn analyze_video(
        &self,
        video: AcquiredVideo,
        query: &str,
        progress: ProgressFn<'_>,
    ) -> Result<AnalysisResult> {
        let outcome = self.upload_and_analyze(&video, query, progress).await;
        video.discard().await;
        outcome
    }

    async fn upload_and_analyze(
        &self,
        video: &AcquiredVideo,
        query: &str,
        progress: ProgressFn<'_>,
    ) -> Result<AnalysisResult> {
        progress(StageUpdate::Started(Stage::UploadingVideo));
        let asset = self
            .poller
            .upload_and_wait(self.media.as_ref(), video.path(), video.mime_type())
            .await?;
        progress(StageUpdate::Finished(
            Stage::UploadingVideo,
            asset.name.clone(),
        ));

        self.run_analysis(query, AnalysisContent::Video(asset), progress)
            .await
    }

    async fn run_analysis(
        &self,
        query: &str,
        content: AnalysisContent,
        progress: ProgressFn<'_>,
    ) -> Result<AnalysisResult> {
        progress(StageUpdate::Started(Stage::Analyzing));
        let result = self.analyzer.analyze(query, content).await?;
        let chars = result.content.chars().count();
        info!(chars, "analysis finished");
        progress(StageUpdate::Finished(
            Stage::Analyzing,
            format!("{} characters", chars),
        ));
        Ok(result)
    }
}
