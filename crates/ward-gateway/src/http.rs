//! HTTP surface mirroring the voice pipeline for browser clients.
//!
//! `/process_voice` runs the same transcribe, generate, synthesize sequence
//! as the live turn loop, over an uploaded WAV instead of the microphone.
//! The pipeline is single-flight: a second upload while one is in progress
//! is refused with 429 rather than queued.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use ward_core::{ConversationStore, ResponseGenerator, Turn, FALLBACK_REPLY};
use ward_voice::{Synthesizer, Transcriber, Utterance};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub busy: Arc<AtomicBool>,
    pub audio_dir: PathBuf,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        generator: Arc<dyn ResponseGenerator>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            generator,
            transcriber,
            synthesizer,
            busy: Arc::new(AtomicBool::new(false)),
            audio_dir,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process_voice", post(process_voice))
        .route("/chat_history", get(chat_history))
        .route("/clear_history", post(clear_history))
        .route("/audio/:filename", get(serve_audio))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Clears the single-flight flag even if the pipeline panics.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat_history(State(state): State<AppState>) -> Json<serde_json::Value> {
    let history = state.store.load_all();
    Json(json!({ "history": history }))
}

async fn clear_history(State(state): State<AppState>) -> Response {
    match state.store.clear() {
        Ok(()) => Json(json!({ "status": "cleared" })).into_response(),
        Err(e) => {
            warn!(target: "ward::http", "failed to clear history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to clear history" })),
            )
                .into_response()
        }
    }
}

async fn process_voice(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let Some(guard) = BusyGuard::acquire(&state.busy) else {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "a request is already being processed" })),
        )
            .into_response();
    };

    let mut audio_bytes: Option<Vec<u8>> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("audio") {
                    match field.bytes().await {
                        Ok(bytes) => audio_bytes = Some(bytes.to_vec()),
                        Err(e) => {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(json!({ "error": format!("failed to read upload: {}", e) })),
                            )
                                .into_response()
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid multipart body: {}", e) })),
                )
                    .into_response()
            }
        }
    }

    let Some(audio_bytes) = audio_bytes else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing 'audio' field" })),
        )
            .into_response();
    };

    let (samples, sample_rate) = match decode_wav(&audio_bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("could not decode WAV: {}", e) })),
            )
                .into_response()
        }
    };

    let pipeline_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        run_pipeline(&pipeline_state, samples, sample_rate)
    })
    .await;

    match result {
        Ok(Ok(reply)) => Json(reply).into_response(),
        Ok(Err(response)) => response,
        Err(e) => {
            warn!(target: "ward::http", "voice pipeline task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal pipeline failure" })),
            )
                .into_response()
        }
    }
}

/// The blocking half of `/process_voice`: same sequence and same failure
/// policy as the live turn loop.
fn run_pipeline(
    state: &AppState,
    samples: Vec<f32>,
    sample_rate: u32,
) -> Result<serde_json::Value, Response> {
    let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64);
    let utterance = Utterance {
        samples,
        started_at: Duration::ZERO,
        ended_at: duration,
        sample_rate,
    };

    // Whitespace-only transcripts count as no speech; trim before the guard.
    let user_input = match state.transcriber.transcribe(&utterance) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(target: "ward::http", "transcription failed: {}", e);
            return Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "transcription failed" })),
            )
                .into_response());
        }
    };
    if user_input.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "no speech detected" })),
        )
            .into_response());
    }
    info!(target: "ward::http", user_input = %user_input, "voice request");

    if let Err(e) = state.store.append(Turn::user(&user_input)) {
        warn!(target: "ward::http", "failed to record user turn: {}", e);
    }
    let reply = match state.generator.generate(&state.store.load_all()) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(target: "ward::http", "generation failed, using fallback: {}", e);
            FALLBACK_REPLY.to_string()
        }
    };
    if let Err(e) = state.store.append(Turn::assistant(&reply)) {
        warn!(target: "ward::http", "failed to record assistant turn: {}", e);
    }

    let audio_url = match state.synthesizer.synthesize(&reply) {
        Ok(audio) => save_reply_audio(&state.audio_dir, &audio),
        Err(e) => {
            warn!(target: "ward::http", "synthesis failed, responding without audio: {}", e);
            None
        }
    };

    Ok(json!({
        "user_input": user_input,
        "assistant_response": reply,
        "audio_url": audio_url,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn save_reply_audio(audio_dir: &std::path::Path, audio: &[u8]) -> Option<String> {
    if let Err(e) = std::fs::create_dir_all(audio_dir) {
        warn!(target: "ward::http", "cannot create audio directory: {}", e);
        return None;
    }
    let filename = format!("reply_{}.wav", Utc::now().format("%Y%m%d%H%M%S%3f"));
    match std::fs::write(audio_dir.join(&filename), audio) {
        Ok(()) => Some(format!("/audio/{}", filename)),
        Err(e) => {
            warn!(target: "ward::http", "failed to save reply audio: {}", e);
            None
        }
    }
}

async fn serve_audio(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    // Names are generated server-side; anything with a path separator is
    // not one of ours.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    match tokio::fs::read(state.audio_dir.join(&filename)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Decode an uploaded WAV into mono f32 samples.
fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), String> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    // Downmix by averaging channels.
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    if samples.is_empty() {
        return Err("no audio samples".to_string());
    }
    Ok((samples, spec.sample_rate))
}
