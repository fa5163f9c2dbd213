//! Generative flows.
//!
//! Each flow is a single request/response call: build a prompt that demands
//! a strict JSON object, send it through the configured [`LlmProvider`], and
//! parse the reply into a typed output. Callers decide how fatal a failure
//! is; nothing here retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::LlmConfig;

pub const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("LLM transport error: {0}")]
    Transport(String),
    #[error("Malformed model output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, FlowError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, FlowError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": 1000
            }))
            .send()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;
        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        Ok(content)
    }
}

/// Pull the JSON object out of a model reply. Models wrap output in code
/// fences often enough that bare `from_str` is not an option.
fn extract_json(raw: &str) -> Result<&str, FlowError> {
    let trimmed = raw.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else {
        trimmed
    };
    let start = inner
        .find('{')
        .ok_or_else(|| FlowError::Malformed(format!("no JSON object in reply: {raw:.80}")))?;
    let end = inner
        .rfind('}')
        .ok_or_else(|| FlowError::Malformed(format!("unterminated JSON object: {raw:.80}")))?;
    if end < start {
        return Err(FlowError::Malformed("unterminated JSON object".to_string()));
    }
    Ok(&inner[start..=end])
}

fn parse_output<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, FlowError> {
    serde_json::from_str(extract_json(raw)?).map_err(|e| FlowError::Malformed(e.to_string()))
}

// ===== suggest_replies =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRepliesOutput {
    pub suggestions: Vec<String>,
}

pub async fn suggest_replies(
    llm: &dyn LlmProvider,
    last_message: &str,
) -> Result<SuggestRepliesOutput, FlowError> {
    let prompt = format!(
        "You are assisting a customer of a personal finance app in a support chat.\n\
         The latest message from the support agent is:\n\
         \"{last_message}\"\n\n\
         Suggest up to {MAX_SUGGESTIONS} short replies the customer could send next. \
         Each must be a single sentence.\n\
         Respond with only a JSON object of the form \
         {{\"suggestions\": [\"...\"]}}."
    );
    let raw = llm.generate(&prompt).await?;
    let mut output: SuggestRepliesOutput = parse_output(&raw)?;
    output.suggestions.truncate(MAX_SUGGESTIONS);
    debug!(count = output.suggestions.len(), "reply suggestions generated");
    Ok(output)
}

// ===== enhance_reply =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceReplyOutput {
    pub enhanced_reply: String,
}

pub async fn enhance_reply(
    llm: &dyn LlmProvider,
    conversation: &str,
    draft: &str,
) -> Result<EnhanceReplyOutput, FlowError> {
    if draft.trim().is_empty() {
        return Ok(EnhanceReplyOutput {
            enhanced_reply: String::new(),
        });
    }
    let prompt = format!(
        "A customer of a personal finance app is writing a reply in a support chat.\n\
         Conversation so far:\n{conversation}\n\n\
         Their draft reply:\n\"{draft}\"\n\n\
         Rewrite the draft so it is clear, polite and complete, keeping the \
         customer's intent. Respond with only a JSON object of the form \
         {{\"enhanced_reply\": \"...\"}}."
    );
    let raw = llm.generate(&prompt).await?;
    parse_output(&raw)
}

// ===== financial_advice =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialAdviceInput {
    pub income: String,
    pub expenses: String,
    pub debts: String,
    pub goals: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialAdviceOutput {
    pub summary: String,
    pub recommendations: Vec<String>,
}

pub async fn financial_advice(
    llm: &dyn LlmProvider,
    input: &FinancialAdviceInput,
) -> Result<FinancialAdviceOutput, FlowError> {
    let prompt = format!(
        "You are a financial advisor. A user describes their situation:\n\
         Monthly income: {}\n\
         Monthly expenses: {}\n\
         Outstanding debts: {}\n\
         Goals: {}\n\n\
         Give a short assessment and concrete next steps. Respond with only a \
         JSON object of the form {{\"summary\": \"...\", \"recommendations\": [\"...\"]}}.",
        input.income, input.expenses, input.debts, input.goals
    );
    let raw = llm.generate(&prompt).await?;
    parse_output(&raw)
}

// ===== spending_insights =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingInsightsOutput {
    pub report: String,
}

pub async fn spending_insights(
    llm: &dyn LlmProvider,
    transactions: &str,
) -> Result<SpendingInsightsOutput, FlowError> {
    let prompt = format!(
        "Analyze the following list of personal transactions and produce a \
         short spending report: notable categories, trends and one saving \
         opportunity.\n\nTransactions:\n{transactions}\n\n\
         Respond with only a JSON object of the form {{\"report\": \"...\"}}."
    );
    let raw = llm.generate(&prompt).await?;
    parse_output(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockLlm {
        reply: String,
        calls: AtomicUsize,
    }

    impl MockLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        async fn generate(&self, _prompt: &str) -> Result<String, FlowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_extract_json_bare_object() {
        assert_eq!(extract_json(r#"{"a": 1}"#).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "```json\n{\"suggestions\": [\"ok\"]}\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"suggestions\": [\"ok\"]}");
    }

    #[test]
    fn test_extract_json_with_prose_around() {
        let raw = "Sure, here you go: {\"report\": \"fine\"} hope that helps";
        assert_eq!(extract_json(raw).unwrap(), "{\"report\": \"fine\"}");
    }

    #[test]
    fn test_extract_json_rejects_no_object() {
        assert!(matches!(
            extract_json("no structured data here"),
            Err(FlowError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_suggest_replies_caps_at_three() {
        let llm = MockLlm::new(
            r#"{"suggestions": ["one", "two", "three", "four", "five"]}"#,
        );
        let out = suggest_replies(&llm, "Your card has been unblocked.")
            .await
            .unwrap();
        assert_eq!(out.suggestions.len(), MAX_SUGGESTIONS);
        assert_eq!(out.suggestions[0], "one");
    }

    #[tokio::test]
    async fn test_enhance_reply_blank_draft_skips_model() {
        let llm = MockLlm::new(r#"{"enhanced_reply": "should not be used"}"#);
        let out = enhance_reply(&llm, "Agent: hello", "   ").await.unwrap();
        assert_eq!(out.enhanced_reply, "");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_enhance_reply_returns_model_text() {
        let llm = MockLlm::new(r#"{"enhanced_reply": "Could you please unblock my card?"}"#);
        let out = enhance_reply(&llm, "Agent: hello", "unblock card pls")
            .await
            .unwrap();
        assert_eq!(out.enhanced_reply, "Could you please unblock my card?");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_financial_advice_parses_fenced_output() {
        let llm = MockLlm::new(
            "```json\n{\"summary\": \"tight but workable\", \"recommendations\": [\"cut subscriptions\"]}\n```",
        );
        let input = FinancialAdviceInput {
            income: "4000".into(),
            expenses: "3500".into(),
            debts: "12000".into(),
            goals: "emergency fund".into(),
        };
        let out = financial_advice(&llm, &input).await.unwrap();
        assert_eq!(out.summary, "tight but workable");
        assert_eq!(out.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_spending_insights_malformed_output_is_an_error() {
        let llm = MockLlm::new("I cannot produce JSON today.");
        let result = spending_insights(&llm, "2026-07-01,Groceries,-54.20").await;
        assert!(matches!(result, Err(FlowError::Malformed(_))));
    }
}
