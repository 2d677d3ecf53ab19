//! Text-completion providers used to phrase fired reminders.
//!
//! Provides the [`CompletionService`] trait and two implementations: an
//! OpenAI-compatible HTTP client and an offline template. The provider is created via
//! [`create_service`] from configuration.

pub mod http;
pub mod template;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use http::HttpCompletionService;
pub use template::TemplateCompletionService;

/// Turns a prompt into a single natural-language reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create a completion service from config.
///
/// `"template"` needs no network. `"http"` reads its API key from the environment
/// variable named by `api_key_env` and fails if it is unset.
pub fn create_service(
    config: &crate::config::CompletionConfig,
) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "template" => Ok(Arc::new(TemplateCompletionService::new())),
        "http" => Ok(Arc::new(HttpCompletionService::from_config(config)?)),
        other => anyhow::bail!("unknown completion provider: {other}. Supported: template, http"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompletionConfig;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = CompletionConfig {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        let err = create_service(&config).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn http_provider_needs_api_key() {
        let config = CompletionConfig {
            provider: "http".into(),
            api_key_env: "HABITLOOP_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        assert!(create_service(&config).is_err());
    }
}
