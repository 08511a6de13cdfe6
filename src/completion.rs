//! Completion Service Client
//!
//! Asks an OpenAI-compatible chat-completions endpoint for a website
//! manifest. The reply text is returned untouched; shaping it is the
//! normalizer's job.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, SiteError};

/// Instruction constraining the reply to the manifest JSON shape
pub const SYSTEM_PROMPT: &str = r#"Return ONLY JSON (no markdown), exactly like:
{
  "entry":"index.html",
  "files":[
    {"name":"index.html","content":"<!doctype html>..."},
    {"name":"style.css","content":"/* css */"},
    {"name":"app.js","content":"// js"}
  ]
}
Rules:
- Do not include backticks or code fences.
- All <link> and <script src> paths must match the "files" names you return.
- HTML files must be full HTML5 documents (doctype, head, body).
- If you cannot produce JSON, return a single complete HTML document instead.
- Keep it concise and functional."#;

/// One generation request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt: String,
}

impl CompletionRequest {
    /// The user turn sent alongside the system instruction
    pub fn user_message(&self) -> String {
        format!("Create a small, working website for: {}", self.prompt)
    }
}

/// Something that turns a prompt into raw completion text
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Blocking client for a chat-completions endpoint
pub struct HttpCompletionClient {
    http: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from config; `Unconfigured` when no credential is set
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SiteError::Unconfigured("completion API key is not set".to_string()))?;
        Self::new(
            config.api_url.clone(),
            api_key,
            Duration::from_millis(config.request_timeout_ms),
        )
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(request.user_message()),
                },
            ],
        };

        tracing::debug!(model = %request.model, url = %self.api_url, "Requesting completion");
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Completion service rejected request");
            return Err(SiteError::UpstreamGeneration {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: ChatResponse = response.json()?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}
