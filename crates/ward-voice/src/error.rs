//! Error types for the ward voice engine.

use thiserror::Error;

/// Result type alias for voice operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised by the real-time audio engine and its collaborators.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Playback already in progress")]
    PlaybackBusy,

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::Stream(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::Stream(err.to_string())
    }
}
