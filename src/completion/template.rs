use anyhow::Result;
use async_trait::async_trait;

use super::CompletionService;

/// Offline provider: phrases the quoted reminder text from the prompt as a nudge.
#[derive(Debug, Default, Clone)]
pub struct TemplateCompletionService;

impl TemplateCompletionService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionService for TemplateCompletionService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(match quoted(prompt) {
            Some(text) => format!("Hey! Just a friendly nudge: {text}. You've got this."),
            None => "Hey! Just checking in on your plans for today.".to_string(),
        })
    }
}

/// Text between the first and last double quote, if non-empty.
fn quoted(prompt: &str) -> Option<&str> {
    let start = prompt.find('"')? + 1;
    let end = prompt.rfind('"')?;
    let text = prompt.get(start..end)?.trim();
    (!text.is_empty()).then_some(text)
}
