//! The voice turn loop: listen, transcribe, think, speak, repeat.
//!
//! One turn is strictly sequential. The only concurrency is the barge-in
//! monitor running while a reply plays. Collaborators sit behind traits so
//! the loop is testable without a microphone or network.
//!
//! Failure policy per turn:
//! - transcription failure or an empty transcript skips the turn entirely,
//!   nothing is recorded;
//! - generation failure records and speaks the fixed fallback reply;
//! - synthesis or playback failure keeps the reply in history but skips the
//!   spoken part.

use crate::error::VoiceResult;
use crate::interrupt::{InterruptMonitor, InterruptSignal};
use crate::playback::{PlaybackController, PlaybackHandle, PlaybackState};
use crate::stt::{Transcriber, WhisperApiTranscriber};
use crate::tts::{SpeechApiSynthesizer, Synthesizer};
use crate::vad::{SegmentOutcome, Segmenter, VadConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ward_core::{
    AgentConfig, ConversationStore, EngineSettings, ResponseGenerator, Turn, FALLBACK_REPLY,
};

/// Produces the next finalized utterance, or reports an interrupt observed
/// while waiting.
pub trait SpeechSource {
    fn next_utterance(&mut self, signal: &InterruptSignal) -> VoiceResult<SegmentOutcome>;
}

/// Plays one synthesized reply, honoring barge-in.
pub trait Speaker {
    fn speak(&mut self, audio: &[u8], signal: &InterruptSignal) -> VoiceResult<SpeakOutcome>;
}

/// Where the loop currently is within a turn. Purely observational; the
/// loop's control flow is the sequence itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    WaitingForSpeech,
    Transcribing,
    Generating,
    Synthesizing,
    Speaking,
}

/// How a spoken reply ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    Finished,
    /// The user talked over the reply; playback was killed.
    Interrupted,
}

/// What happened to the reply audio in a completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPlayback {
    Completed,
    Interrupted,
    /// Synthesis or playback failed; the reply exists only in history.
    Skipped,
}

/// Result of one pass through the loop.
#[derive(Debug)]
pub enum TurnOutcome {
    /// An interrupt latch was observed while listening; pending audio was
    /// dropped and the loop goes straight back to listening.
    Interrupted,
    /// Nothing intelligible was transcribed; nothing was recorded.
    NoTranscript,
    Completed {
        user_input: String,
        reply: String,
        playback: ReplyPlayback,
    },
}

/// The sequential orchestrator.
pub struct TurnLoop {
    source: Box<dyn SpeechSource>,
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn ResponseGenerator>,
    synthesizer: Arc<dyn Synthesizer>,
    speaker: Box<dyn Speaker>,
    store: Arc<dyn ConversationStore>,
    signal: InterruptSignal,
    phase: TurnPhase,
}

impl TurnLoop {
    pub fn new(
        source: Box<dyn SpeechSource>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn Synthesizer>,
        speaker: Box<dyn Speaker>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            source,
            transcriber,
            generator,
            synthesizer,
            speaker,
            store,
            signal: InterruptSignal::new(),
            phase: TurnPhase::WaitingForSpeech,
        }
    }

    pub fn signal(&self) -> InterruptSignal {
        self.signal.clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn enter(&mut self, phase: TurnPhase) {
        tracing::debug!(target: "ward::voice", phase = ?phase, "phase change");
        self.phase = phase;
    }

    /// Run exactly one turn.
    pub fn run_turn(&mut self) -> VoiceResult<TurnOutcome> {
        self.enter(TurnPhase::WaitingForSpeech);
        let utterance = match self.source.next_utterance(&self.signal)? {
            SegmentOutcome::Interrupted => return Ok(TurnOutcome::Interrupted),
            SegmentOutcome::Utterance(u) => u,
        };

        self.enter(TurnPhase::Transcribing);
        // Trim here: the trait does not promise trimmed output, and a
        // whitespace-only transcript must not reach the generator or history.
        let user_input = match self.transcriber.transcribe(&utterance) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(target: "ward::voice", "transcription failed, skipping turn: {}", e);
                return Ok(TurnOutcome::NoTranscript);
            }
        };
        if user_input.is_empty() {
            info!(target: "ward::voice", "empty transcript, skipping turn");
            return Ok(TurnOutcome::NoTranscript);
        }
        info!(target: "ward::voice", user_input = %user_input, "user turn");

        // The user turn is recorded before generation so a failed reply
        // never loses what the user said.
        if let Err(e) = self.store.append(Turn::user(&user_input)) {
            warn!(target: "ward::voice", "failed to record user turn: {}", e);
        }

        self.enter(TurnPhase::Generating);
        let reply = match self.generator.generate(&self.store.load_all()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(target: "ward::voice", "generation failed, using fallback: {}", e);
                FALLBACK_REPLY.to_string()
            }
        };
        info!(target: "ward::voice", reply = %reply, "assistant turn");
        if let Err(e) = self.store.append(Turn::assistant(&reply)) {
            warn!(target: "ward::voice", "failed to record assistant turn: {}", e);
        }

        self.enter(TurnPhase::Synthesizing);
        let playback = match self.synthesizer.synthesize(&reply) {
            Err(e) => {
                warn!(target: "ward::voice", "synthesis failed, reply not spoken: {}", e);
                ReplyPlayback::Skipped
            }
            Ok(audio) => {
                self.enter(TurnPhase::Speaking);
                match self.speaker.speak(&audio, &self.signal) {
                    Ok(SpeakOutcome::Finished) => ReplyPlayback::Completed,
                    Ok(SpeakOutcome::Interrupted) => {
                        info!(target: "ward::voice", "reply interrupted, back to listening");
                        ReplyPlayback::Interrupted
                    }
                    Err(e) => {
                        warn!(target: "ward::voice", "playback failed, reply not spoken: {}", e);
                        ReplyPlayback::Skipped
                    }
                }
            }
        };

        Ok(TurnOutcome::Completed {
            user_input,
            reply,
            playback,
        })
    }

    /// Run turns until `shutdown` is set. Turn-level errors are logged and
    /// the loop keeps going.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(target: "ward::voice", "turn loop started");
        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.run_turn() {
                warn!(target: "ward::voice", "turn failed: {}", e);
                std::thread::sleep(Duration::from_millis(250));
            }
        }
        info!(target: "ward::voice", "turn loop stopped");
    }
}

/// Speech source backed by the live microphone segmenter.
pub struct LiveSpeechSource {
    segmenter: Segmenter,
}

impl LiveSpeechSource {
    pub fn new(segmenter: Segmenter) -> Self {
        Self { segmenter }
    }
}

impl SpeechSource for LiveSpeechSource {
    fn next_utterance(&mut self, signal: &InterruptSignal) -> VoiceResult<SegmentOutcome> {
        Ok(self.segmenter.wait(signal))
    }
}

/// Speaker backed by the real output device, with a barge-in monitor alive
/// for exactly the duration of each reply.
pub struct LiveSpeaker {
    settings: EngineSettings,
    playback: PlaybackHandle,
}

impl LiveSpeaker {
    pub fn new(settings: EngineSettings, playback: PlaybackHandle) -> Self {
        Self { settings, playback }
    }
}

impl Speaker for LiveSpeaker {
    fn speak(&mut self, audio: &[u8], signal: &InterruptSignal) -> VoiceResult<SpeakOutcome> {
        let monitor = InterruptMonitor::start(&self.settings, signal.clone(), self.playback.clone())?;

        let outcome = match self.playback.play(audio) {
            Ok(()) => match self.playback.wait_until_done(signal) {
                PlaybackState::Stopped => {
                    // Consume the latch here; the next listen starts clean
                    // and picks up the interrupting speech from the queue.
                    signal.take();
                    Ok(SpeakOutcome::Interrupted)
                }
                _ => Ok(SpeakOutcome::Finished),
            },
            Err(e) => Err(e),
        };

        monitor.stop();
        outcome
    }
}

/// Build the full live pipeline and run it until `shutdown` is set.
///
/// Must be called on a thread that can own the audio devices for its whole
/// lifetime; the playback controller is not `Send`.
pub fn run_live(
    config: &AgentConfig,
    store: Arc<dyn ConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
    shutdown: &AtomicBool,
) -> VoiceResult<()> {
    let (capture, queue) = crate::audio::AudioCapture::open(crate::audio::AudioConfig::vad())?;
    let controller = PlaybackController::new()?;

    let segmenter = Segmenter::new(
        queue,
        VadConfig::new(&config.engine, crate::audio::AudioConfig::vad().sample_rate),
    );
    let transcriber = Arc::new(WhisperApiTranscriber::new(config.stt.clone())?);
    let synthesizer = Arc::new(SpeechApiSynthesizer::new(
        config.tts.clone(),
        config.tts_voice.clone(),
    )?);
    let speaker = LiveSpeaker::new(config.engine, controller.handle());

    let mut turn_loop = TurnLoop::new(
        Box::new(LiveSpeechSource::new(segmenter)),
        transcriber,
        generator,
        synthesizer,
        Box::new(speaker),
        store,
    );
    turn_loop.run(shutdown);

    capture.stop();
    Ok(())
}
