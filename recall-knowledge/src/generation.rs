//! Text generation client (Ollama `/api/chat`), non-streaming and
//! streaming variants.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use recall_core::OllamaSettings;

use crate::errors::{KnowledgeError, KnowledgeResult};

/// One turn of model input.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GenerationClient {
    pub fn new(settings: &OllamaSettings) -> Self {
        Self {
            base_url: settings.host.trim_end_matches('/').to_string(),
            model: settings.llm_model.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Single-shot generation.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: &GenerationOptions,
    ) -> KnowledgeResult<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatTurn::system(system));
        }
        messages.push(ChatTurn::user(prompt));

        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: ModelOptions::from(options),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Generation(format!(
                "generation request failed: {status} {text}"
            )));
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .message
            .map(|message| message.content)
            .ok_or_else(|| {
                KnowledgeError::Generation("generation response missing message".to_string())
            })
    }

    /// Stream a conversation; yields incremental text fragments. The
    /// caller owns assembly and persistence of the full response.
    pub fn chat_stream(
        &self,
        messages: Vec<ChatTurn>,
        options: GenerationOptions,
    ) -> impl Stream<Item = KnowledgeResult<String>> + 'static {
        let client = self.client.clone();
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            options: ModelOptions::from(&options),
        };

        try_stream! {
            let response = client.post(&url).json(&body).send().await?;
            let response = check_status(response).await?;

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(part) = byte_stream.next().await {
                let bytes = part?;
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(fragment) = parse_stream_line(&line)? {
                        yield fragment;
                    }
                }
            }

            let tail = buffer.trim().to_string();
            if !tail.is_empty() {
                if let Some(fragment) = parse_stream_line(&tail)? {
                    yield fragment;
                }
            }
        }
    }
}

async fn check_status(response: reqwest::Response) -> KnowledgeResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(KnowledgeError::Generation(format!(
        "generation request failed: {status} {text}"
    )))
}

fn parse_stream_line(line: &str) -> KnowledgeResult<Option<String>> {
    let chunk: ChatStreamChunk = serde_json::from_str(line)
        .map_err(|e| KnowledgeError::Generation(format!("malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(KnowledgeError::Generation(error));
    }

    Ok(chunk
        .message
        .map(|message| message.content)
        .filter(|content| !content.is_empty()))
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatTurn>,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ModelOptions {
    temperature: f32,
    num_predict: u32,
}

impl From<&GenerationOptions> for ModelOptions {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: Option<ChatContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatStreamChunk {
    message: Option<ChatContent>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatContent {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_line_with_content_yields_fragment() {
        let fragment =
            parse_stream_line(r#"{"message":{"role":"assistant","content":"Hello"},"done":false}"#)
                .unwrap();
        assert_eq!(fragment.as_deref(), Some("Hello"));
    }

    #[test]
    fn final_stream_line_without_content_is_skipped() {
        let fragment =
            parse_stream_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#)
                .unwrap();
        assert!(fragment.is_none());
    }

    #[test]
    fn backend_error_lines_become_generation_errors() {
        let result = parse_stream_line(r#"{"error":"model not found"}"#);
        assert!(matches!(result, Err(KnowledgeError::Generation(_))));
    }

    #[test]
    fn garbage_lines_become_generation_errors() {
        let result = parse_stream_line("not json at all");
        assert!(matches!(result, Err(KnowledgeError::Generation(_))));
    }
}
