//! Chat completion bridge: turns the conversation history into a reply.
//!
//! The client targets any OpenAI-compatible completions endpoint. Retrieval
//! context and the urgency notice are injected as opaque system messages
//! ahead of the ordered history; the model never sees raw knowledge entries
//! as anything other than text.

use crate::config::ApiSettings;
use crate::error::{CoreError, CoreResult};
use crate::knowledge::{is_urgent, search_knowledge};
use crate::prompts::{SYSTEM_PROMPT, URGENCY_NOTICE};
use crate::turn::{Role, Turn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONTEXT_TOP_K: usize = 3;

/// Produces the assistant reply for a full ordered history.
///
/// Implementations may fail with `CoreError::Generation`; the turn loop never
/// propagates that failure, it substitutes the fixed fallback reply.
pub trait ResponseGenerator: Send + Sync {
    fn generate(&self, history: &[Turn]) -> CoreResult<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireReply,
}

#[derive(Deserialize)]
struct WireReply {
    content: String,
}

/// Blocking chat client. Runs on the turn-loop thread (or inside
/// `spawn_blocking` from the gateway); never on the audio threads.
pub struct ChatClient {
    settings: ApiSettings,
    client: reqwest::blocking::Client,
}

impl ChatClient {
    pub fn new(settings: ApiSettings) -> CoreResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CoreError::Generation(e.to_string()))?;
        Ok(Self { settings, client })
    }

    fn api_key(&self) -> CoreResult<&str> {
        self.settings
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::Config("CHAT_API_KEY is not set".to_string()))
    }
}

/// Assemble the wire messages: persona, retrieved context, urgency notice,
/// then the full ordered history.
fn build_messages(history: &[Turn]) -> Vec<WireMessage> {
    let latest_user = history
        .iter()
        .rev()
        .find(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .unwrap_or("");

    let mut messages = vec![WireMessage {
        role: "system",
        content: SYSTEM_PROMPT.to_string(),
    }];

    let context = search_knowledge(latest_user, CONTEXT_TOP_K);
    if !context.is_empty() {
        messages.push(WireMessage {
            role: "system",
            content: format!("Relevant information:\n{}", context.join("\n")),
        });
    }

    if is_urgent(latest_user) {
        messages.push(WireMessage {
            role: "system",
            content: URGENCY_NOTICE.to_string(),
        });
    }

    for turn in history {
        messages.push(WireMessage {
            role: turn.role.as_str(),
            content: turn.content.clone(),
        });
    }

    messages
}

impl ResponseGenerator for ChatClient {
    fn generate(&self, history: &[Turn]) -> CoreResult<String> {
        let key = self.api_key()?;
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: build_messages(history),
            temperature: 0.7,
            max_tokens: 1024,
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .map_err(|e| CoreError::Generation(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(CoreError::Generation(format!(
                "chat API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = res.json().map_err(|e| CoreError::Generation(e.to_string()))?;
        let reply = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| CoreError::Generation("chat API returned no choices".to_string()))?;

        tracing::debug!(chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_start_with_system_prompt_then_history() {
        let history = vec![Turn::user("hello"), Turn::assistant("hi there")];
        let messages = build_messages(&history);

        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Riverton General Hospital"));
        let n = messages.len();
        assert_eq!(messages[n - 2].role, "user");
        assert_eq!(messages[n - 1].role, "assistant");
    }

    #[test]
    fn urgent_query_adds_urgency_notice() {
        let history = vec![Turn::user("I have chest pain right now")];
        let messages = build_messages(&history);
        assert!(messages
            .iter()
            .any(|m| m.role == "system" && m.content.contains("URGENT")));
    }

    #[test]
    fn routine_query_has_no_urgency_notice() {
        let history = vec![Turn::user("when are you open?")];
        let messages = build_messages(&history);
        assert!(!messages.iter().any(|m| m.content.contains("URGENT")));
    }

    #[test]
    fn context_is_prepended_for_matching_query() {
        let history = vec![Turn::user("what should I do about a mild headache?")];
        let messages = build_messages(&history);
        assert!(messages
            .iter()
            .any(|m| m.role == "system" && m.content.starts_with("Relevant information:")));
    }

    #[test]
    fn client_without_key_fails_with_config_error() {
        let client = ChatClient::new(ApiSettings {
            base_url: "https://example.invalid/v1".to_string(),
            api_key: None,
            model: "test".to_string(),
        })
        .unwrap();
        let err = client.generate(&[Turn::user("hi")]).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
