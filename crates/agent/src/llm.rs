use std::time::Duration;

use async_trait::async_trait;
use retaily_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// A fully rendered prompt: instructions for the model plus the user turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion transport failed: {0}")]
    Transport(String),
    #[error("completion endpoint returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("completion did not match the expected schema: {message}")]
    Schema { message: String },
    #[error("completion response carried no content")]
    MissingContent,
    #[error("completion client configuration invalid: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError>;
}

/// HTTP-backed completion client. The provider is config data; every
/// provider reduces to "rendered prompt in, completion text out".
pub struct HttpCompletionClient {
    http: reqwest::Client,
    provider: LlmProvider,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl HttpCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CompletionError::Configuration(error.to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(config.provider).to_string());

        Ok(Self {
            http,
            provider: config.provider,
            api_key: config.api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn dispatch(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        match self.provider {
            LlmProvider::OpenAi => self.complete_openai(prompt).await,
            LlmProvider::Anthropic => self.complete_anthropic(prompt).await,
            LlmProvider::Ollama => self.complete_ollama(prompt).await,
        }
    }

    async fn complete_openai(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = OpenAiRequest {
            model: &self.model,
            messages: vec![
                OpenAiMessage { role: "system", content: &prompt.system },
                OpenAiMessage { role: "user", content: &prompt.user },
            ],
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(transport)?;
        let payload = read_payload::<OpenAiResponse>(response).await?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::MissingContent)
    }

    async fn complete_anthropic(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: 1024,
            system: &prompt.system,
            messages: vec![AnthropicMessage { role: "user", content: &prompt.user }],
        };

        let mut request = self.http.post(&url).header("anthropic-version", "2023-06-01");
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key.expose_secret());
        }

        let response = request.json(&body).send().await.map_err(transport)?;
        let payload = read_payload::<AnthropicResponse>(response).await?;

        payload
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or(CompletionError::MissingContent)
    }

    async fn complete_ollama(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaRequest {
            model: &self.model,
            system: &prompt.system,
            prompt: &prompt.user,
            stream: false,
        };

        let response = self.http.post(&url).json(&body).send().await.map_err(transport)?;
        let payload = read_payload::<OllamaResponse>(response).await?;

        if payload.response.is_empty() {
            return Err(CompletionError::MissingContent);
        }
        Ok(payload.response)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let mut attempt = 0u32;
        loop {
            match self.dispatch(prompt).await {
                Ok(text) => return Ok(text),
                Err(error) if attempt < self.max_retries && is_retryable(&error) => {
                    attempt += 1;
                    warn!(
                        event_name = "completion.retry",
                        attempt,
                        error = %error,
                        "retrying completion request"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Parse a structured completion. Models wrap JSON in prose or code fences
/// often enough that the outermost object is extracted before parsing; a
/// payload that still fails to deserialize is a schema error.
pub fn parse_structured<T: DeserializeOwned>(completion: &str) -> Result<T, CompletionError> {
    let trimmed = completion.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return serde_json::from_str::<T>(&trimmed[start..=end])
                .map_err(|error| CompletionError::Schema { message: error.to_string() });
        }
    }

    Err(CompletionError::Schema { message: "completion contained no JSON object".to_string() })
}

fn is_retryable(error: &CompletionError) -> bool {
    match error {
        CompletionError::Transport(_) => true,
        CompletionError::Api { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

fn transport(error: reqwest::Error) -> CompletionError {
    CompletionError::Transport(error.to_string())
}

fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "https://api.openai.com",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
    }
}

async fn read_payload<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CompletionError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CompletionError::Api { status: status.as_u16(), body });
    }

    response
        .json::<T>()
        .await
        .map_err(|error| CompletionError::Schema { message: error.to_string() })
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: Option<String>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::{default_base_url, is_retryable, parse_structured, CompletionError};
    use retaily_core::config::LlmProvider;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        reasoning: String,
        can_answer: bool,
    }

    #[test]
    fn parses_bare_json_object() {
        let verdict: Verdict =
            parse_structured(r#"{"reasoning": "State column exists", "can_answer": true}"#)
                .expect("bare json should parse");

        assert!(verdict.can_answer);
        assert_eq!(verdict.reasoning, "State column exists");
    }

    #[test]
    fn parses_json_wrapped_in_code_fences() {
        let completion = "```json\n{\"reasoning\": \"no churn column\", \"can_answer\": false}\n```";
        let verdict: Verdict = parse_structured(completion).expect("fenced json should parse");

        assert!(!verdict.can_answer);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let completion = concat!(
            "Here is my decision: ",
            r#"{"reasoning": "Quantity can be summed", "can_answer": true}"#,
            " Let me know if you need more."
        );
        let verdict: Verdict = parse_structured(completion).expect("embedded json should parse");

        assert!(verdict.can_answer);
    }

    #[test]
    fn mistyped_fields_are_a_schema_error() {
        let error = parse_structured::<Verdict>(r#"{"reasoning": "ok", "can_answer": "yes"}"#)
            .expect_err("string boolean must fail");

        assert!(matches!(error, CompletionError::Schema { .. }));
    }

    #[test]
    fn prose_without_json_is_a_schema_error() {
        let error = parse_structured::<Verdict>("I cannot answer that, sorry.")
            .expect_err("prose must fail");

        assert!(matches!(error, CompletionError::Schema { .. }));
    }

    #[test]
    fn transport_and_server_errors_are_retryable() {
        assert!(is_retryable(&CompletionError::Transport("connection reset".to_string())));
        assert!(is_retryable(&CompletionError::Api { status: 429, body: String::new() }));
        assert!(is_retryable(&CompletionError::Api { status: 503, body: String::new() }));
    }

    #[test]
    fn client_and_schema_errors_are_not_retryable() {
        assert!(!is_retryable(&CompletionError::Api { status: 401, body: String::new() }));
        assert!(!is_retryable(&CompletionError::Schema { message: String::new() }));
        assert!(!is_retryable(&CompletionError::MissingContent));
    }

    #[test]
    fn providers_have_sensible_default_endpoints() {
        assert_eq!(default_base_url(LlmProvider::OpenAi), "https://api.openai.com");
        assert_eq!(default_base_url(LlmProvider::Anthropic), "https://api.anthropic.com");
        assert_eq!(default_base_url(LlmProvider::Ollama), "http://localhost:11434");
    }
}
