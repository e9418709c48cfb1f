//! Text-to-speech over an OpenAI-compatible speech API.

use crate::error::{VoiceError, VoiceResult};
use crate::stt::pcm_to_wav;
use std::time::Duration;
use tracing::{debug, info};
use ward_core::ApiSettings;

/// Renders a reply as encoded audio bytes ready for the playback decoder.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

/// Blocking client for `/audio/speech`.
pub struct SpeechApiSynthesizer {
    settings: ApiSettings,
    voice: String,
    client: reqwest::blocking::Client,
}

impl SpeechApiSynthesizer {
    pub fn new(settings: ApiSettings, voice: String) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        Ok(Self {
            settings,
            voice,
            client,
        })
    }
}

impl Synthesizer for SpeechApiSynthesizer {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| VoiceError::Config("TTS_API_KEY is not set".to_string()))?;

        debug!(target: "ward::voice", chars = text.len(), "requesting speech synthesis");
        let url = format!(
            "{}/audio/speech",
            self.settings.base_url.trim_end_matches('/')
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&SpeechRequest {
                model: &self.settings.model,
                input: text,
                voice: &self.voice,
                response_format: "wav",
            })
            .send()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Synthesis(format!(
                "speech API error {}: {}",
                status, body
            )));
        }

        let audio = res
            .bytes()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?
            .to_vec();
        info!(target: "ward::voice", bytes = audio.len(), "synthesized reply audio");
        Ok(audio)
    }
}

/// Test double producing a short silent WAV.
pub struct SilentSynthesizer;

impl Synthesizer for SilentSynthesizer {
    fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        // 100ms of silence at 16kHz.
        Ok(pcm_to_wav(&vec![0.0; 1600], 16_000))
    }
}
