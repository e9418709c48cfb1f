//! Speech-to-text over an OpenAI-compatible transcription API.

use crate::error::{VoiceError, VoiceResult};
use crate::vad::Utterance;
use std::time::Duration;
use tracing::{debug, info};
use ward_core::ApiSettings;

/// Turns a finalized utterance into text. An empty string is a valid result
/// and means nothing intelligible was said.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String>;
}

/// Encode f32 samples as a mono 16-bit PCM WAV file in memory.
pub fn pcm_to_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        wav.extend_from_slice(&((clamped * i16::MAX as f32) as i16).to_le_bytes());
    }

    wav
}

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Blocking client for `/audio/transcriptions` (Whisper-style multipart).
pub struct WhisperApiTranscriber {
    settings: ApiSettings,
    client: reqwest::blocking::Client,
}

impl WhisperApiTranscriber {
    pub fn new(settings: ApiSettings) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        Ok(Self { settings, client })
    }
}

impl Transcriber for WhisperApiTranscriber {
    fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String> {
        let key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| VoiceError::Config("STT_API_KEY is not set".to_string()))?;

        let wav = pcm_to_wav(&utterance.samples, utterance.sample_rate);
        debug!(target: "ward::voice", bytes = wav.len(), "sending utterance for transcription");

        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.settings.model.clone());

        let url = format!(
            "{}/audio/transcriptions",
            self.settings.base_url.trim_end_matches('/')
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Transcription(format!(
                "transcription API error {}: {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse = res
            .json()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let text = parsed.text.trim().to_string();
        info!(target: "ward::voice", chars = text.len(), "transcription received");
        Ok(text)
    }
}

/// Test double returning a fixed transcript.
pub struct FixedTranscriber(pub String);

impl Transcriber for FixedTranscriber {
    fn transcribe(&self, _utterance: &Utterance) -> VoiceResult<String> {
        Ok(self.0.clone())
    }
}
