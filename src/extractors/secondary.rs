// src/extractors/secondary.rs
use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use std::time::Duration;

use crate::catalogue::{Field, Statement};
use crate::config::SecondaryConfig;
use crate::document::Page;
use crate::extractors::number::parse_number;
use crate::extractors::FieldValues;
use crate::utils::error::SecondaryError;

/// A hosted model that answers a prompt with free text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SecondaryError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenRouter-compatible chat-completions client.
pub struct OpenRouterBackend {
    client: reqwest::Client,
    config: SecondaryConfig,
}

impl OpenRouterBackend {
    pub fn new(config: SecondaryConfig) -> Result<Self, SecondaryError> {
        if config.api_key.trim().is_empty() {
            return Err(SecondaryError::Disabled("no API key configured".to_string()));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("ap2_extractor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    async fn request(&self, prompt: &str) -> Result<String, SecondaryError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} from {}", status, self.config.endpoint);
            return Err(SecondaryError::Http(status));
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SecondaryError::Malformed("response has no message content".to_string()))
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterBackend {
    async fn complete(&self, prompt: &str) -> Result<String, SecondaryError> {
        tracing::info!("Asking {} for a second opinion", self.config.model);
        let seconds = self.config.timeout_secs;
        tokio::time::timeout(Duration::from_secs(seconds), self.request(prompt))
            .await
            .map_err(|_| SecondaryError::Timeout(seconds))?
    }
}

/// Prompt carrying the wanted field keys, unit rules, and the page's raw text.
pub fn build_prompt(statement: Statement, wanted: &[Field], page_text: &str) -> String {
    let fields = wanted
        .iter()
        .map(|field| format!("- {}: {}", field.key(), field.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let number_rule = if statement.allows_decimal() {
        "Keep decimals as printed."
    } else {
        "Return whole numbers without thousands separators."
    };

    format!(
        "Extract values from this {statement} page of an AP2 (Second Swedish National Pension Fund) report.\n\
         All amounts are in {unit}; do not convert units.\n\
         Take the first (current period) column when several periods are shown. Keep minus signs.\n\
         {number_rule}\n\n\
         Fields:\n{fields}\n\n\
         Return ONLY a JSON object mapping each field name to its number. Omit fields you cannot find.\n\n\
         Page text:\n{page_text}",
        statement = statement.name(),
        unit = statement.unit(),
    )
}

/// Reads a reply into field values. Unknown keys, unwanted keys, and non-numeric values are
/// ignored; an unparseable reply yields no values.
pub fn parse_field_response(content: &str, wanted: &[Field], allow_decimal: bool) -> FieldValues {
    let body = strip_code_fences(content);
    let object = match serde_json::from_str::<Map<String, JsonValue>>(body) {
        Ok(object) => object,
        Err(e) => {
            tracing::warn!("Secondary reply is not a JSON object: {}", e);
            return FieldValues::new();
        }
    };

    let mut values = FieldValues::new();
    for (key, raw) in object {
        let Some(field) = Field::from_key(&key).filter(|field| wanted.contains(field)) else {
            tracing::debug!("Ignoring unexpected key '{}' in secondary reply", key);
            continue;
        };
        let parsed = match &raw {
            JsonValue::Number(number) => parse_number(&number.to_string(), allow_decimal),
            JsonValue::String(text) => parse_number(text, allow_decimal),
            _ => None,
        };
        match parsed {
            Some(value) => {
                values.insert(field, value);
            }
            None => tracing::debug!("Non-numeric value for {}: {}", field, raw),
        }
    }
    values
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim(),
    }
}

/// Fallback extractor: sends a page to the backend and reads back whatever parses.
pub struct SecondaryExtractor {
    backend: Box<dyn CompletionBackend>,
}

impl SecondaryExtractor {
    pub fn new(backend: Box<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &SecondaryConfig) -> Result<Self, SecondaryError> {
        Ok(Self::new(Box::new(OpenRouterBackend::new(config.clone())?)))
    }

    pub async fn extract(
        &self,
        page: &Page,
        statement: Statement,
        wanted: &[Field],
    ) -> Result<FieldValues, SecondaryError> {
        if wanted.is_empty() {
            return Ok(FieldValues::new());
        }
        let prompt = build_prompt(statement, wanted, &page.text());
        let reply = self.backend.complete(&prompt).await?;
        let values = parse_field_response(&reply, wanted, statement.allows_decimal());
        tracing::info!(
            "Secondary extraction returned {}/{} {} field(s)",
            values.len(),
            wanted.len(),
            statement.name()
        );
        Ok(values)
    }
}
