//! Runs the live microphone turn loop on a dedicated thread.
//!
//! The audio devices (and rodio's output stream in particular) must live on
//! one thread for the whole session, so the loop gets its own OS thread
//! rather than a tokio task.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};
use ward_core::{AgentConfig, ConversationStore, ResponseGenerator};

pub fn spawn(
    config: AgentConfig,
    store: Arc<dyn ConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("ward-live".to_string())
        .spawn(move || {
            info!(target: "ward::voice", "starting live voice session");
            if let Err(e) = ward_voice::run_live(&config, store, generator, &shutdown) {
                error!(target: "ward::voice", "live voice session failed: {}", e);
            }
        })
}
