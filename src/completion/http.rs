use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::CompletionService;
use crate::config::CompletionConfig;

/// OpenAI-compatible `chat/completions` client.
pub struct HttpCompletionService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    system_prompt: String,
}

impl HttpCompletionService {
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "completion provider `http` needs an API key in ${}",
                config.api_key_env
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            system_prompt: config.system_prompt.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("chat completion error ({status}): {error_text}");
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("failed to parse chat completion response")?;

        extract_content(&response_json)
    }
}

fn extract_content(response: &serde_json::Value) -> Result<String> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .unwrap_or_default();
    anyhow::ensure!(!content.is_empty(), "chat completion returned no content");
    Ok(content.to_string())
}
