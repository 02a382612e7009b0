use super::{LLMError, Result};
use crate::config::LLMConfig;
use async_trait::async_trait;
use careerflow_sdk::agent::{GenerateRequest, LanguageModel, ToolError};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Chat and embedding client for any OpenAI-compatible endpoint
pub struct OpenAICompatibleModel {
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAICompatibleModel {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            api_key: config.api_key(),
            client,
        })
    }

    /// Override the key read from the environment
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn post(&self, endpoint: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(format!("{}: {}", status, text)));
            }
        }

        response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))
    }

    pub async fn chat(&self, request: &GenerateRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature.unwrap_or(self.temperature),
        });
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if request.json {
            payload["response_format"] = json!({"type": "json_object"});
        }

        debug!("Chat completion with {} ({} chars)", self.model, request.prompt.len());
        let data = self.post("chat/completions", payload).await?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))
    }

    pub async fn embeddings(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "model": self.embedding_model,
            "input": text,
        });
        let data = self.post("embeddings", payload).await?;

        let vector = data
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|d| d.get("embedding"))
            .and_then(|e| e.as_array())
            .ok_or_else(|| LLMError::ParseError("No embedding in response".to_string()))?;

        let vector: Vec<f32> = vector
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect();
        if vector.is_empty() {
            return Err(LLMError::ParseError("Empty embedding".to_string()));
        }
        Ok(vector)
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatibleModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<String, ToolError> {
        Ok(self.chat(request).await?)
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ToolError> {
        Ok(self.embeddings(text).await?)
    }
}
