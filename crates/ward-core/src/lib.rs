//! Core domain for the Riverton General Hospital voice assistant.
//!
//! Everything here is audio-agnostic: conversation turns and their persistent
//! store, the bundled knowledge base with keyword retrieval, the chat
//! completion client, and the agent configuration. The real-time audio engine
//! lives in `ward-voice` and consumes these pieces through the
//! `ConversationStore` and `ResponseGenerator` traits.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod prompts;
pub mod turn;

pub use config::{AgentConfig, ApiSettings, EngineSettings};
pub use error::{CoreError, CoreResult};
pub use knowledge::{is_urgent, search_knowledge};
pub use llm::{ChatClient, ResponseGenerator};
pub use prompts::FALLBACK_REPLY;
pub use turn::{ConversationStore, InMemoryStore, JsonFileStore, Role, Turn};
