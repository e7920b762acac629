use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Node};
use tracing::{info, warn};

use crate::error::{ClipsageError, Result};

const USER_AGENT: &str = concat!("clipsage/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Elements whose text never counts as visible content.
const HIDDEN_ELEMENTS: [&str; 2] = ["script", "style"];

/// Produces visible text for a URL. `None` means "no usable content".
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Option<String>;
}

/// Fetches a page over HTTP and strips it down to its visible text.
#[derive(Debug, Clone)]
pub struct WebsiteExtractor {
    client: Client,
}

impl WebsiteExtractor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch and extract, keeping the failure cause.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClipsageError::RemoteStatus {
                status: status.as_u16(),
                body: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let html = response.text().await?;
        Ok(html_to_text(&html))
    }
}

#[async_trait]
impl TextExtractor for WebsiteExtractor {
    async fn extract(&self, url: &str) -> Option<String> {
        match self.fetch_text(url).await {
            Ok(text) if text.is_empty() => {
                warn!(url, "website has no visible text");
                None
            }
            Ok(text) => {
                info!(url, chars = text.chars().count(), "extracted website text");
                Some(text)
            }
            Err(e) => {
                warn!(url, error = %e, "website extraction failed");
                None
            }
        }
    }
}

/// Visible text of an HTML document, in document order, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut pieces: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|element| HIDDEN_ELEMENTS.contains(&element.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        pieces.extend(text.split_whitespace());
    }

    pieces.join(" ")
}
