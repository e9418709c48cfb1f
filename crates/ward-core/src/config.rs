//! Agent configuration loaded from `.env`.
//!
//! The audio engine's tuning constants are fixed at startup (no adaptive
//! thresholding). Every value has a documented default and an environment
//! override.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | WARD_VAD_THRESHOLD | 0.01 | Energy magnitude above which a block counts as speech. |
//! | WARD_SILENCE_DURATION_MS | 1500 | Silence after speech before an utterance is finalized. |
//! | WARD_MIN_SPEECH_DURATION_MS | 500 | Shorter speech bursts are discarded as noise. |
//! | WARD_INTERRUPT_THRESHOLD | 0.01 | Energy magnitude that triggers barge-in during playback. |
//! | WARD_INTERRUPT_COOLDOWN_MS | 100 | Suppress re-triggering on residual audio after an interrupt. |
//! | WARD_HISTORY_FILE | conversation_log.json | Conversation history JSON file. |
//! | WARD_BIND_ADDR | 0.0.0.0:5000 | Gateway listen address. |
//! | WARD_LIVE_VOICE | false | Start the live microphone turn loop alongside the gateway. |
//! | CHAT_API_URL | https://api.groq.com/openai/v1 | OpenAI-compatible chat completions base URL. |
//! | CHAT_API_KEY | (none) | Bearer key for the chat API. |
//! | CHAT_MODEL | llama3-8b-8192 | Chat model name. |
//! | STT_API_URL | https://api.openai.com/v1 | Transcription API base URL. |
//! | STT_API_KEY | (falls back to CHAT_API_KEY) | Bearer key for transcription. |
//! | STT_MODEL | whisper-1 | Transcription model. |
//! | TTS_API_URL | https://api.openai.com/v1 | Speech synthesis API base URL. |
//! | TTS_API_KEY | (falls back to CHAT_API_KEY) | Bearer key for synthesis. |
//! | TTS_MODEL | tts-1 | Synthesis model. |
//! | TTS_VOICE | alloy | Synthesis voice. |

use std::time::Duration;

/// Tuning constants for the real-time audio engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Energy magnitude above which a block counts as speech (strict `>`).
    pub vad_threshold: f32,
    /// Silence after speech before the utterance is finalized.
    pub silence_duration: Duration,
    /// Minimum valid speech length; shorter bursts are noise.
    pub min_speech_duration: Duration,
    /// Energy magnitude that triggers barge-in while the assistant speaks.
    /// Independent from `vad_threshold` even though the defaults coincide.
    pub interrupt_threshold: f32,
    /// Window after an interrupt during which re-triggering is suppressed.
    pub interrupt_cooldown: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            vad_threshold: 0.01,
            silence_duration: Duration::from_millis(1500),
            min_speech_duration: Duration::from_millis(500),
            interrupt_threshold: 0.01,
            interrupt_cooldown: Duration::from_millis(100),
        }
    }
}

/// Connection settings for one OpenAI-compatible API surface.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Full agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub engine: EngineSettings,
    pub chat: ApiSettings,
    pub stt: ApiSettings,
    pub tts: ApiSettings,
    pub tts_voice: String,
    pub history_file: String,
    pub bind_addr: String,
    pub live_voice: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            chat: ApiSettings {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key: None,
                model: "llama3-8b-8192".to_string(),
            },
            stt: ApiSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "whisper-1".to_string(),
            },
            tts: ApiSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "tts-1".to_string(),
            },
            tts_voice: "alloy".to_string(),
            history_file: "conversation_log.json".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            live_voice: false,
        }
    }
}

impl AgentConfig {
    /// Load from environment. Unset or invalid values fall back to the
    /// defaults documented in the module header.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let chat_key = env_opt_string("CHAT_API_KEY");
        Self {
            engine: EngineSettings {
                vad_threshold: env_f32("WARD_VAD_THRESHOLD", defaults.engine.vad_threshold),
                silence_duration: env_duration_ms(
                    "WARD_SILENCE_DURATION_MS",
                    defaults.engine.silence_duration,
                ),
                min_speech_duration: env_duration_ms(
                    "WARD_MIN_SPEECH_DURATION_MS",
                    defaults.engine.min_speech_duration,
                ),
                interrupt_threshold: env_f32(
                    "WARD_INTERRUPT_THRESHOLD",
                    defaults.engine.interrupt_threshold,
                ),
                interrupt_cooldown: env_duration_ms(
                    "WARD_INTERRUPT_COOLDOWN_MS",
                    defaults.engine.interrupt_cooldown,
                ),
            },
            chat: ApiSettings {
                base_url: env_string("CHAT_API_URL", &defaults.chat.base_url),
                api_key: chat_key.clone(),
                model: env_string("CHAT_MODEL", &defaults.chat.model),
            },
            stt: ApiSettings {
                base_url: env_string("STT_API_URL", &defaults.stt.base_url),
                api_key: env_opt_string("STT_API_KEY").or_else(|| chat_key.clone()),
                model: env_string("STT_MODEL", &defaults.stt.model),
            },
            tts: ApiSettings {
                base_url: env_string("TTS_API_URL", &defaults.tts.base_url),
                api_key: env_opt_string("TTS_API_KEY").or(chat_key),
                model: env_string("TTS_MODEL", &defaults.tts.model),
            },
            tts_voice: env_string("TTS_VOICE", &defaults.tts_voice),
            history_file: env_string("WARD_HISTORY_FILE", &defaults.history_file),
            bind_addr: env_string("WARD_BIND_ADDR", &defaults.bind_addr),
            live_voice: env_bool("WARD_LIVE_VOICE", false),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
