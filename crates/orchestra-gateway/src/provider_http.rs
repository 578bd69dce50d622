//! A `ResponseProvider` that forwards generative calls to an HTTP
//! backend (OpenAI-compatible chat completions). Stands in for any real
//! upstream until a deployment wires its own `ResponseProvider`
//! implementation.

use async_trait::async_trait;
use orchestra_core::Value;
use orchestra_router::{Error, ProviderInfo, ProviderRequest, ProviderResponse, Result, ResponseProvider};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub struct HttpResponseProvider {
    info: ProviderInfo,
    backend_url: String,
    client: reqwest::Client,
}

impl HttpResponseProvider {
    pub fn new(info: ProviderInfo, backend_url: impl Into<String>) -> Self {
        Self {
            info,
            backend_url: backend_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

#[async_trait]
impl ResponseProvider for HttpResponseProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let model = request.model.as_deref().unwrap_or_else(|| self.info.preferred_model(&request.request_type));

        let body = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.query,
            }],
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.backend_url))
            .json(&json!(body))
            .send()
            .await
            .map_err(|e| Error::provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::provider(format!("backend returned {}", response.status())));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| Error::provider(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::provider("backend returned no choices"))?;

        let tokens_used = parsed.usage.total_tokens;
        Ok(ProviderResponse {
            data: Value::string(content),
            tokens_used,
            estimated_cost: tokens_used as f64 * 0.000_002,
        })
    }
}
