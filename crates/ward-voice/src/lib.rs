//! Real-time voice engine for the hospital assistant.
//!
//! Continuous microphone capture feeds an energy-threshold segmenter; a
//! sequential turn loop transcribes each utterance, generates a reply through
//! `ward-core`, synthesizes it, and plays it back while a barge-in monitor
//! lets the user talk over the assistant at any time.

pub mod audio;
pub mod error;
pub mod interrupt;
pub mod playback;
pub mod stt;
pub mod tts;
pub mod turn_loop;
pub mod vad;

pub use audio::{AudioBlock, AudioCapture, AudioConfig, BlockQueue, CaptureHandle};
pub use error::{VoiceError, VoiceResult};
pub use interrupt::{InterruptDetector, InterruptMonitor, InterruptSignal};
pub use playback::{PlaybackController, PlaybackHandle, PlaybackState};
pub use stt::{pcm_to_wav, FixedTranscriber, Transcriber, WhisperApiTranscriber};
pub use tts::{SilentSynthesizer, SpeechApiSynthesizer, Synthesizer};
pub use turn_loop::{
    run_live, LiveSpeaker, LiveSpeechSource, ReplyPlayback, SpeakOutcome, Speaker, SpeechSource,
    TurnLoop, TurnOutcome, TurnPhase,
};
pub use vad::{block_energy, SegmentOutcome, Segmenter, SegmenterState, Utterance, VadConfig};
