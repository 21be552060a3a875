use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::{Completion, Summarizer};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    api_key: String,
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Build a client from `OPENAI_API_KEY`. A missing or blank key is a
    /// configuration error.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(Error::Config(format!("{API_KEY_ENV} must be set"))),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send one prompt; returns the generated text and total token usage.
    pub async fn complete(&self, prompt: String) -> Result<(String, u64)> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Llm(format!(
                "API request failed with status {status}: {error_text}"
            )));
        }

        let body: ChatResponse = response.json().await?;
        parse_response(body)
    }
}

impl Summarizer for OpenAiClient {
    async fn summarize(&self, text: &str, prefix: &str) -> Completion {
        log::debug!("Calling {} ({} chars)", self.model, text.len());
        let started = Instant::now();
        match self.complete(format!("{prefix}\n\n{text}")).await {
            Ok((text, total_tokens)) => Completion::Generated {
                text,
                total_tokens,
                elapsed: started.elapsed(),
            },
            Err(e) => {
                log::warn!("Summarizer call failed: {e}");
                Completion::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn parse_response(body: ChatResponse) -> Result<(String, u64)> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Llm("No content in completion response".to_string()))?;
    let usage = body
        .usage
        .ok_or_else(|| Error::Llm("No usage in completion response".to_string()))?;
    Ok((content, usage.total_tokens))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let client = OpenAiClient::new("sk-test".to_string()).unwrap();
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_client_builder() {
        let client = OpenAiClient::new("sk-test".to_string())
            .unwrap()
            .with_model("gpt-4o".to_string())
            .with_base_url("http://localhost:8080/v1/".to_string());
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_parse_response() {
        let body: ChatResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "All good."}}],
                "usage": {"prompt_tokens": 30, "completion_tokens": 4, "total_tokens": 34}
            }"#,
        )
        .unwrap();
        assert_eq!(parse_response(body).unwrap(), ("All good.".to_string(), 34));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [], "usage": {"total_tokens": 3}}"#).unwrap();
        assert!(parse_response(body).is_err());
    }

    #[test]
    fn test_parse_response_without_usage() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "hi"}}]}"#,
        )
        .unwrap();
        assert!(parse_response(body).is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: "Summarize all teams' 3-day activity:\n\nstuff".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_failed_completion() {
        let client = OpenAiClient::new("sk-test".to_string())
            .unwrap()
            .with_base_url("http://127.0.0.1:1".to_string());
        let completion = client.summarize("text", "Summarize").await;
        assert!(completion.is_failed());
        assert_eq!(completion.text(), "Error");
        assert_eq!(completion.total_tokens(), 0);
        assert_eq!(completion.elapsed_secs(), 0.0);
    }
}
