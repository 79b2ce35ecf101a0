use crate::config::VisionConfig;
use crate::vision::{SlipExtractor, SlipImage, EXTRACTION_PROMPT};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// OpenAI-compatible chat-completions client for slip extraction.
#[derive(Clone)]
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    api_key: String,
    organization: Option<String>,
    config: VisionConfig,
}

impl OpenAiVisionClient {
    pub fn new(http: reqwest::Client, api_key: String, config: VisionConfig) -> Self {
        Self {
            http,
            api_key,
            organization: None,
            config,
        }
    }

    pub fn with_organization(mut self, organization: String) -> Self {
        self.organization = Some(organization);
        self
    }

    pub fn from_env(http: reqwest::Client, config: VisionConfig) -> Result<Self> {
        let api_key =
            std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY missing (set env var)")?;
        if api_key.trim().is_empty() {
            return Err(anyhow!("OPENAI_API_KEY empty"));
        }

        let client = Self::new(http, api_key, config);
        Ok(match std::env::var("OPENAI_ORG_ID")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(org) => client.with_organization(org),
            None => client,
        })
    }

    fn build_request(&self, image: &SlipImage) -> ChatCompletionRequest {
        let data_url = format!(
            "data:{};base64,{}",
            image.mime_type,
            STANDARD.encode(&image.bytes)
        );

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: Some(self.config.max_tokens),
        }
    }
}

#[async_trait]
impl SlipExtractor for OpenAiVisionClient {
    async fn extract(&self, image: &SlipImage) -> Result<String> {
        let start = Instant::now();
        let req = self.build_request(image);

        let mut http_req = self
            .http
            .post(&self.config.endpoint)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .bearer_auth(&self.api_key);
        if let Some(org) = &self.organization {
            http_req = http_req.header("OpenAI-Organization", org);
        }

        let resp = http_req
            .json(&req)
            .send()
            .await
            .context("vision request")?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let snippet: String = body.chars().take(800).collect();
            return Err(anyhow!("vision api {}: {}", status.as_u16(), snippet));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).context("vision json parse")?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .unwrap_or_default();

        debug!(
            slip = image.name.as_str(),
            model = self.config.model.as_str(),
            latency_ms = start.elapsed().as_millis() as u64,
            total_tokens = parsed.usage.and_then(|u| u.total_tokens),
            "vision reply received"
        );

        Ok(content)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    pub message: Option<ChatMessageOut>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageOut {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    pub total_tokens: Option<u64>,
}
