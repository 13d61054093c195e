use crate::client::OpenAiClient;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use risk_agent_core::{AgentError, MarketFeatures, Result, RiskModel};
use serde::Deserialize;
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "You are a crypto trading risk analyst. Given a token's recent \
market statistics, rate the risk of opening a long position now on a scale from 0 (very low \
risk) to 100 (very high risk). Weigh volatility, liquidity and trend. Reply with a JSON object \
of the form {\"risk_score\": <number>} and nothing else.";

#[derive(Debug, Deserialize)]
struct ScoreReply {
    risk_score: f64,
}

/// Risk scores from a chat-completion model answering in JSON mode.
#[derive(Debug, Clone)]
pub struct OpenAiRiskModel {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiRiskModel {
    #[must_use]
    pub fn new(client: OpenAiClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    async fn request(&self, features: &MarketFeatures) -> AnyResult<f64> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": features.describe() },
            ],
        });
        let response = self.client.post("/chat/completions", &body).await?;
        parse_score(&response)
    }
}

/// Pulls `risk_score` out of the first choice's message content.
///
/// # Errors
/// Returns an error if the reply is missing or is not the expected JSON object.
pub fn parse_score(response: &Value) -> AnyResult<f64> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .context("Completion had no message content")?;
    let reply: ScoreReply = serde_json::from_str(content.trim())
        .with_context(|| format!("Model reply is not a score object: {content}"))?;
    Ok(reply.risk_score)
}

#[async_trait]
impl RiskModel for OpenAiRiskModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score(&self, features: &MarketFeatures) -> Result<f64> {
        features.validate()?;
        let score = self
            .request(features)
            .await
            .map_err(|e| AgentError::collaborator(format!("risk model for {}: {e:#}", features.symbol)))?;
        tracing::debug!(symbol = %features.symbol, model = %self.model, score, "Model scored features");
        Ok(score)
    }
}
