//! Riverton General Hospital voice assistant gateway.
//!
//! Serves the HTTP surface and, when WARD_LIVE_VOICE is set, runs the live
//! microphone turn loop alongside it against the same conversation store.

mod http;
mod live;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ward_core::{AgentConfig, ChatClient, JsonFileStore};
use ward_voice::{SpeechApiSynthesizer, WhisperApiTranscriber};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env();
    info!(target: "ward::gateway", bind = %config.bind_addr, "starting gateway");

    let store = Arc::new(JsonFileStore::new(&config.history_file));
    let generator = match ChatClient::new(config.chat.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("failed to build chat client: {}", e);
            std::process::exit(1);
        }
    };
    let transcriber = match WhisperApiTranscriber::new(config.stt.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("failed to build transcriber: {}", e);
            std::process::exit(1);
        }
    };
    let synthesizer = match SpeechApiSynthesizer::new(config.tts.clone(), config.tts_voice.clone())
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("failed to build synthesizer: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut live_thread = None;
    if config.live_voice {
        match live::spawn(
            config.clone(),
            store.clone(),
            generator.clone(),
            shutdown.clone(),
        ) {
            Ok(handle) => live_thread = Some(handle),
            Err(e) => warn!(target: "ward::voice", "could not start live session: {}", e),
        }
    }

    let state = http::AppState::new(
        store,
        generator,
        transcriber,
        synthesizer,
        PathBuf::from("reply_audio"),
    );
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    if let Some(handle) = live_thread {
        let _ = handle.join();
    }
}
