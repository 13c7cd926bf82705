//! Intent classification: a capability trait over the external
//! language-understanding call, plus the LLM-backed implementation.
//!
//! Policy lives here, extraction lives in the model: low confidence or a
//! schema violation gets at most one retry with a reworded prompt, then
//! degrades to `Unknown`. The call is bounded by a timeout and never
//! propagates a failure to the caller.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::intent::{Intent, WireResponse};
use crate::prompts;

/// Short conversation context handed to the classifier alongside the text.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: i64,
    pub timezone: Option<Tz>,
    /// Known habit names, so "I ran" can extract the right reference.
    pub habit_names: Vec<String>,
    pub now: DateTime<Utc>,
    pub raw_text: String,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Best-effort structured extraction with graceful degradation: always
    /// returns an intent, falling back to `Unknown` with the original text.
    async fn classify(&self, ctx: &UserContext) -> Intent;
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Inclusive: a response at exactly this confidence is accepted.
    pub confidence_threshold: f64,
    pub timeout: StdDuration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".to_string(),
            model: "openai/gpt-oss-20b".to_string(),
            api_key: None,
            confidence_threshold: 0.6,
            timeout: StdDuration::from_secs(5),
        }
    }
}

/// Classifier backed by an OpenAI-compatible chat-completions endpoint.
pub struct LlmClassifier {
    cfg: ClassifierConfig,
    client: reqwest::Client,
}

impl LlmClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_default();
        Self { cfg, client }
    }

    pub fn accepts(&self, confidence: f64) -> bool {
        confidence >= self.cfg.confidence_threshold
    }

    async fn extract_once(&self, system_extra: &str, user_msg: &str) -> Result<WireResponse> {
        #[derive(Serialize)]
        struct Msg {
            role: &'static str,
            content: String,
        }

        #[derive(Serialize)]
        struct Req {
            model: String,
            messages: Vec<Msg>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let key = self
            .cfg
            .api_key
            .as_deref()
            .context("classifier api_key not configured")?;

        let body = Req {
            model: self.cfg.model.clone(),
            messages: vec![
                Msg {
                    role: "system",
                    content: format!("{}\n\n{}", prompts::EXTRACTION_SYSTEM, system_extra),
                },
                Msg {
                    role: "user",
                    content: user_msg.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.cfg.base_url))
            .header(AUTHORIZATION, format!("Bearer {key}"))
            .json(&body)
            .send()
            .await
            .context("classification request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("classification error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse classification response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .context("empty classification response")?;

        parse_wire(&content)
    }
}

/// Pull the JSON object out of the model's reply, tolerating code fences and
/// stray prose around it.
pub fn parse_wire(content: &str) -> Result<WireResponse> {
    let start = content.find('{').context("no JSON object in response")?;
    let end = content.rfind('}').context("no JSON object in response")?;
    if end < start {
        bail!("no JSON object in response");
    }
    serde_json::from_str(&content[start..=end]).context("malformed intent JSON")
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, ctx: &UserContext) -> Intent {
        let context_line = prompts::extraction_context(ctx);
        let attempts = [ctx.raw_text.clone(), prompts::reworded(&ctx.raw_text)];

        for (i, user_msg) in attempts.iter().enumerate() {
            // The reqwest client carries the timeout; a hang degrades exactly
            // like malformed output.
            match self.extract_once(&context_line, user_msg).await {
                Ok(wire) if self.accepts(wire.confidence) => {
                    match Intent::from_wire(&wire, ctx) {
                        Ok(intent) => {
                            debug!(user_id = ctx.user_id, intent = %wire.intent, confidence = wire.confidence, "classified");
                            return intent;
                        }
                        Err(e) => {
                            warn!(user_id = ctx.user_id, attempt = i, error = %e, "schema-invalid extraction");
                        }
                    }
                }
                Ok(wire) => {
                    warn!(
                        user_id = ctx.user_id,
                        attempt = i,
                        confidence = wire.confidence,
                        "extraction below confidence threshold"
                    );
                }
                Err(e) => {
                    warn!(user_id = ctx.user_id, attempt = i, error = %e, "classification call failed");
                }
            }
        }

        Intent::Unknown {
            raw_text: ctx.raw_text.clone(),
        }
    }
}

/// Test double: fixed text -> intent fixtures, `Unknown` for everything else.
/// Lets the engine be exercised deterministically without mocking the network
/// call's internals.
#[derive(Debug, Clone, Default)]
pub struct FixtureClassifier {
    fixtures: HashMap<String, Intent>,
}

impl FixtureClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: impl Into<String>, intent: Intent) -> Self {
        self.fixtures.insert(text.into(), intent);
        self
    }
}

#[async_trait]
impl IntentClassifier for FixtureClassifier {
    async fn classify(&self, ctx: &UserContext) -> Intent {
        self.fixtures
            .get(&ctx.raw_text)
            .cloned()
            .unwrap_or(Intent::Unknown {
                raw_text: ctx.raw_text.clone(),
            })
    }
}
