use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{ClipsageError, Result},
    provider::{DEFAULT_MODEL, GeminiClient, ensure_success},
    types::{AnalysisContent, AnalysisQuery, AnalysisResult, RemoteAsset},
};

const MARKDOWN_INSTRUCTION: &str = "Use markdown to format your answers.";

/// Fixed agent settings, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    pub web_search: bool,
    pub markdown: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Video AI Summarizer".to_string(),
            model: DEFAULT_MODEL.to_string(),
            web_search: true,
            markdown: true,
        }
    }
}

/// One call to the remote agent: a prompt plus any attached videos.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub prompt: String,
    pub videos: Vec<RemoteAsset>,
}

/// A hosted model, with whatever tools it was configured with.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn run(&self, request: &AgentRequest) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Serialize, Deserialize, Debug)]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Gemini `generateContent` with optional Google Search grounding.
#[derive(Debug, Clone)]
pub struct GeminiAgent {
    client: GeminiClient,
    config: AgentConfig,
}

impl GeminiAgent {
    pub fn new(client: GeminiClient, config: AgentConfig) -> Self {
        Self { client, config }
    }

    fn build_request(&self, request: &AgentRequest) -> GenerateContentRequest {
        let mut parts = vec![Part {
            text: Some(request.prompt.clone()),
            file_data: None,
        }];
        parts.extend(request.videos.iter().map(|video| Part {
            text: None,
            file_data: Some(FileData {
                mime_type: video.mime_type.clone(),
                file_uri: video.uri.clone(),
            }),
        }));

        let system_instruction = self.config.markdown.then(|| Content {
            role: None,
            parts: vec![Part {
                text: Some(MARKDOWN_INSTRUCTION.to_string()),
                file_data: None,
            }],
        });

        let tools = if self.config.web_search {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        GenerateContentRequest {
            system_instruction,
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            tools,
        }
    }
}

#[async_trait]
impl AgentBackend for GeminiAgent {
    async fn run(&self, request: &AgentRequest) -> Result<String> {
        let api_key = self.client.api_key()?;
        let body = self.build_request(request);

        info!(
            agent = %self.config.name,
            model = %self.config.model,
            videos = request.videos.len(),
            web_search = self.config.web_search,
            "running agent"
        );

        let response = self
            .client
            .http()
            .post(self.client.url(&format!(
                "v1beta/models/{}:generateContent",
                self.config.model
            )))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let response = response.json::<GenerateContentResponse>().await?;

        response_text(response)
    }
}

fn response_text(response: GenerateContentResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ClipsageError::InvalidApiResponse {
            reason: "response has no candidates".to_string(),
        })?;

    Ok(candidate
        .content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join(""))
}

pub fn video_prompt(query: &AnalysisQuery) -> String {
    format!(
        "Analyze the uploaded video for content and context.\n\
         Respond to the following query using video insights and web search if needed:\n\
         {}\n\n\
         Provide a detailed, actionable, and user-friendly answer.",
        query.as_str()
    )
}

pub fn website_prompt(query: &AnalysisQuery, website_text: &str) -> String {
    format!(
        "Analyze the following website content for content and context.\n\
         Respond to the following query using website insights and web search if needed:\n\
         {}\n\n\
         Provide a detailed, actionable, and user-friendly answer.\n\n\
         Website content:\n{}",
        query.as_str(),
        website_text
    )
}

/// Builds prompts for a query and hands them to the injected agent.
#[derive(Clone)]
pub struct Analyzer {
    agent: Arc<dyn AgentBackend>,
}

impl Analyzer {
    pub fn new(agent: Arc<dyn AgentBackend>) -> Self {
        Self { agent }
    }

    pub async fn analyze(&self, query: &str, content: AnalysisContent) -> Result<AnalysisResult> {
        let query = AnalysisQuery::new(query)?;
        let kind = content.kind();

        let request = match content {
            AnalysisContent::Video(asset) => AgentRequest {
                prompt: video_prompt(&query),
                videos: vec![asset],
            },
            AnalysisContent::WebsiteText(text) => AgentRequest {
                prompt: website_prompt(&query, &text),
                videos: Vec::new(),
            },
        };

        let content = self.agent.run(&request).await?;
        Ok(AnalysisResult { content, kind })
    }
}
