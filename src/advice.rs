//! Advice requester
//!
//! Builds a chat-completion prompt from the participant's recorded rounds
//! and obtains free-text advice from an external service. Prompt
//! construction is deterministic and separated from the network call so the
//! core stays testable offline. Uses a long-lived reqwest::Client for
//! connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::error::ExperimentError;
use crate::models::ResponseRecord;
use crate::Result;

const SYSTEM_PROMPT: &str = "You are a decision making assistant for a subject participating in a choice experiment. In each round, a randomly generated budget line with prices for options x and y is given. The subject chooses how much to allocate to x given the budget line. After all rounds, the researcher rewards the subject by randomly choosing one of the rounds and one of the options at the chosen round's prices.";

const INSTRUCTION_PROMPT: &str = "Please give advice in Korean, less than 200 words and less than 10 sentences. Make your advice short and coherent. Don't list previous responses from the subject. Give the best advice each round so the subject can make their choices as rational as possible under revealed preference theory.";

/// One chat message in the advice request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

/// Build the advice request messages from a participant's recorded rounds.
///
/// A fixed system/instruction pair followed by one user message per
/// historical round, in ledger order. Pure function of the rows.
pub fn build_advice_messages(rows: &[&ResponseRecord]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(rows.len() + 2);
    messages.push(ChatMessage::new("system", SYSTEM_PROMPT.to_string()));
    messages.push(ChatMessage::new("assistant", INSTRUCTION_PROMPT.to_string()));

    for row in rows {
        messages.push(ChatMessage::new(
            "user",
            format!(
                "Round {} choice: X = {}, Y = {:.2}, Prices: P_X = {:.2}, P_Y = {:.2}, Total Income = {:.2}",
                row.round, row.choice_x, row.choice_y, row.price_x, row.price_y, row.income
            ),
        ));
    }

    messages
}

/// Trait for advice text generation (injectable; the experiment core never
/// talks to the network directly)
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        }
    }

    /// Point the client at an alternate chat-completions endpoint
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl AdviceGenerator for OpenAiClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ExperimentError::AdviceError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
        };

        info!("Calling advice service ({} messages)", messages.len());

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Advice service request failed: {}", e);
                ExperimentError::AdviceError(format!("advice request error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Advice service error response: {}", error_text);
            return Err(ExperimentError::AdviceError(format!(
                "advice service error: {}",
                error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse advice response: {}", e);
            ExperimentError::AdviceError(format!("advice parse error: {}", e))
        })?;

        let answer = completion
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                ExperimentError::AdviceError("Empty response from advice service".to_string())
            })?;

        info!("Advice received ({} chars)", answer.len());

        Ok(answer)
    }
}

/// Canned advice generator for development & testing.
/// Keeps the experiment functional without the live service.
pub struct MockAdviceService;

#[async_trait]
impl AdviceGenerator for MockAdviceService {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let rounds = messages.iter().filter(|m| m.role == "user").count();
        Ok(format!(
            "Consider the relative prices before allocating: when X is cheap relative to Y, spending more of the budget on X keeps your choices consistent. ({} rounds reviewed)",
            rounds
        ))
    }
}

/// Composes prompt construction with an injected generator
pub struct AdviceRequester {
    generator: Box<dyn AdviceGenerator>,
}

impl AdviceRequester {
    pub fn new(generator: Box<dyn AdviceGenerator>) -> Self {
        Self { generator }
    }

    /// Request advice over the participant's accumulated rows.
    ///
    /// The caller passes exactly the current participant's history; the
    /// returned text is passed through verbatim.
    pub async fn request_advice(&self, rows: &[&ResponseRecord]) -> Result<String> {
        if rows.is_empty() {
            return Err(ExperimentError::AdviceError(
                "no recorded rounds to advise on".to_string(),
            ));
        }

        let messages = build_advice_messages(rows);
        self.generator.generate(&messages).await
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
