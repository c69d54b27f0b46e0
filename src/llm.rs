use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::GenerationError;
use crate::vector_db::RankedChunk;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub struct LLMConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl LLMConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client for Gemini `generateContent`. Every failure comes
/// back as a `GenerationError` whose text is shown in place of the answer.
pub struct LLM {
    client: Client,
    config: LLMConfig,
}

impl LLM {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;

        Ok(LLM { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    pub async fn generate_response(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.trim())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Gemini returned an error status");
            return Err(GenerationError::Status(status.as_u16()));
        }

        let payload: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                warn!(error = %e.without_url(), "Gemini response was not JSON");
                GenerationError::UnexpectedFormat
            }
        })?;

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                warn!("Gemini response missing candidates[0].content.parts[0].text");
                GenerationError::UnexpectedFormat
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        // the URL carries the API key
        let e = e.without_url();
        warn!(error = %e, "Gemini request failed");
        if e.is_timeout() {
            GenerationError::Timeout(self.config.timeout)
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Numbered context blocks with their similarity, separated by rules.
pub fn render_context(chunks: &[RankedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Context {} - Similarity: {:.4}]\n{}",
                i + 1,
                chunk.score,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn construct_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an expert Java programming tutor. Answer the following question based ONLY on the provided context from the Java textbook.\n\n\
         CONTEXT FROM JAVA TEXTBOOK:\n{context}\n\n\
         QUESTION: {query}\n\n\
         INSTRUCTIONS:\n\
         - Provide a comprehensive answer based solely on the context\n\
         - Include code examples in markdown format if present\n\
         - If the context lacks sufficient information, clearly state this\n\
         - Structure the answer with clear explanations and examples\n\
         - Use proper Java terminology\n\n\
         ANSWER:"
    )
}
