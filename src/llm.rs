//! LLM client supporting OpenRouter (primary) with local-model fallback.
//!
//! Both endpoints speak the OpenAI chat-completions format; only the base
//! URL and auth differ. The single call this crate makes is text-to-SQL
//! for the query engine.
//!
//! Fallback: any local OpenAI-compatible server (Ollama, llama.cpp, LM Studio).

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

// ─── Provider config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// OpenRouter — https://openrouter.ai
    OpenRouter {
        api_key: String,
        model: String, // e.g. "meta-llama/llama-3.1-8b-instruct"
    },
    /// Any local OpenAI-compatible server (Ollama, llama.cpp, LM Studio)
    Local {
        base_url: String, // e.g. "http://localhost:11434/v1"
        model: String,    // e.g. "llama3"
    },
}

impl LlmProvider {
    pub fn label(&self) -> String {
        match self {
            LlmProvider::OpenRouter { model, .. } => format!("OpenRouter/{}", model),
            LlmProvider::Local { model, .. } => format!("Local/{}", model),
        }
    }
}

// ─── Request types (OpenAI-compatible) ───────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct LlmClient {
    http: Client,
    primary: Option<LlmProvider>,
    fallback: Option<LlmProvider>,
    max_tokens: u32,
}

impl LlmClient {
    /// Build client from config.
    /// Primary = OpenRouter (if key set).
    /// Fallback = local Ollama (if configured).
    pub fn from_config(cfg: &crate::config::LlmConfig) -> Self {
        let primary: Option<LlmProvider> = cfg
            .openrouter_api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .map(|key| LlmProvider::OpenRouter {
                api_key: key.clone(),
                model: cfg.openrouter_model.clone(),
            });

        let fallback: Option<LlmProvider> = cfg
            .local_base_url
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|url| LlmProvider::Local {
                base_url: url.clone(),
                model: cfg.local_model.clone(),
            });

        if primary.is_none() && fallback.is_none() {
            warn!("No LLM provider configured — natural-language queries will fail");
        } else {
            info!(
                "LLM primary:  {}",
                primary.as_ref().map(|p| p.label()).unwrap_or("none".into())
            );
            info!(
                "LLM fallback: {}",
                fallback.as_ref().map(|p| p.label()).unwrap_or("none".into())
            );
        }

        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
            primary,
            fallback,
            max_tokens: cfg.max_tokens,
        }
    }

    /// Text-to-SQL: convert a natural-language question into a SELECT
    /// against the detections schema.
    pub async fn text_to_sql(&self, question: &str, schema: &str) -> Result<String> {
        let system = format!(
            "You are CityEye, an assistant that answers questions about the \
             vehicles seen in one processed video by writing SQLite queries.\n\n\
             SQLite schema:\n```sql\n{schema}\n```\n\n\
             Rules:\n\
             - Output ONLY a single SQLite SELECT query, nothing else\n\
             - No markdown, no explanation\n\
             - Use only tables and columns from the schema\n\
             - license_plate is '' when no plate was read; for plate \
             questions filter with license_plate != ''\n\
             - Match colors and labels fuzzily with LIKE, e.g. color LIKE '%red%'\n\
             - Labels are lowercase: 'car', 'truck', 'bus', 'motorcycle'\n\
             - timestamp is seconds from the start of the video; use it for \
             'when' questions"
        );

        let messages = vec![
            Message {
                role: "system".into(),
                content: system,
            },
            Message {
                role: "user".into(),
                content: question.to_string(),
            },
        ];

        let sql = self.call_with_fallback(messages, self.max_tokens).await?;
        Ok(strip_code_fences(&sql))
    }

    /// Try primary provider, fall back to local on error.
    async fn call_with_fallback(&self, messages: Vec<Message>, max_tokens: u32) -> Result<String> {
        if let Some(ref primary) = self.primary {
            match self.call_provider(primary, messages.clone(), max_tokens).await {
                Ok(r) => return Ok(r),
                Err(e) => warn!("Primary LLM failed: {} — trying fallback", e),
            }
        }

        if let Some(ref fallback) = self.fallback {
            return self.call_provider(fallback, messages, max_tokens).await;
        }

        Err(anyhow!("No LLM provider available"))
    }

    async fn call_provider(
        &self,
        provider: &LlmProvider,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> Result<String> {
        let (base_url, model, auth_value) = match provider {
            LlmProvider::OpenRouter { api_key, model } => (
                "https://openrouter.ai/api/v1/chat/completions".to_string(),
                model.clone(),
                format!("Bearer {}", api_key),
            ),
            LlmProvider::Local { base_url, model } => (
                format!("{}/chat/completions", base_url.trim_end_matches('/')),
                model.clone(),
                "Bearer local".to_string(), // Ollama ignores auth
            ),
        };

        let req_body = ChatRequest {
            model,
            messages,
            max_tokens,
            temperature: Some(0.0),
        };

        debug!("LLM call → {}", base_url);

        let resp = self
            .http
            .post(&base_url)
            .header("Authorization", auth_value)
            .header("Content-Type", "application/json")
            // OpenRouter requires this header (identifies your app)
            .header("HTTP-Referer", "https://github.com/cityeye/cityeye")
            .header("X-Title", "CityEye")
            .json(&req_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("LLM HTTP {}: {}", status, &body[..body.len().min(300)]);
        }

        let json: Value = resp.json().await?;

        // OpenAI-compatible response format
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Unexpected LLM response: {}", json))
    }
}

/// Strip markdown fences models sometimes wrap around the SQL.
fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT * FROM detections\n```"),
            "SELECT * FROM detections"
        );
        assert_eq!(strip_code_fences("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn provider_labels() {
        let p = LlmProvider::OpenRouter {
            api_key: "k".into(),
            model: "meta-llama/llama-3.1-8b-instruct".into(),
        };
        assert_eq!(p.label(), "OpenRouter/meta-llama/llama-3.1-8b-instruct");

        let l = LlmProvider::Local {
            base_url: "http://localhost:11434/v1".into(),
            model: "llama3".into(),
        };
        assert_eq!(l.label(), "Local/llama3");
    }
}
