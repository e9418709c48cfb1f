//! Turn loop behavior with faked collaborators: no microphone, no network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ward_core::{ConversationStore, CoreError, CoreResult, InMemoryStore, ResponseGenerator, Role, Turn, FALLBACK_REPLY};
use ward_voice::{
    FixedTranscriber, InterruptSignal, ReplyPlayback, SegmentOutcome, SilentSynthesizer,
    SpeakOutcome, Speaker, SpeechSource, Transcriber, TurnLoop, TurnOutcome, Utterance,
    VoiceError, VoiceResult,
};

fn utterance() -> Utterance {
    Utterance {
        samples: vec![0.05; 16_000],
        started_at: Duration::ZERO,
        ended_at: Duration::from_secs(1),
        sample_rate: 16_000,
    }
}

struct ScriptedSource(VecDeque<SegmentOutcome>);

impl SpeechSource for ScriptedSource {
    fn next_utterance(&mut self, _signal: &InterruptSignal) -> VoiceResult<SegmentOutcome> {
        Ok(self
            .0
            .pop_front()
            .unwrap_or(SegmentOutcome::Interrupted))
    }
}

fn speech_source() -> Box<ScriptedSource> {
    Box::new(ScriptedSource(VecDeque::from([SegmentOutcome::Utterance(
        utterance(),
    )])))
}

struct FailingTranscriber;

impl Transcriber for FailingTranscriber {
    fn transcribe(&self, _utterance: &Utterance) -> VoiceResult<String> {
        Err(VoiceError::Transcription("backend unreachable".to_string()))
    }
}

struct EchoGenerator {
    calls: AtomicUsize,
}

impl EchoGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl ResponseGenerator for EchoGenerator {
    fn generate(&self, history: &[Turn]) -> CoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = history.last().map(|t| t.content.as_str()).unwrap_or("");
        Ok(format!("You said: {}", last))
    }
}

struct FailingGenerator;

impl ResponseGenerator for FailingGenerator {
    fn generate(&self, _history: &[Turn]) -> CoreResult<String> {
        Err(CoreError::Generation("api down".to_string()))
    }
}

struct FailingSynthesizer;

impl ward_voice::Synthesizer for FailingSynthesizer {
    fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        Err(VoiceError::Synthesis("api down".to_string()))
    }
}

#[derive(Clone)]
struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<usize>>>,
    interrupt: bool,
}

impl RecordingSpeaker {
    fn new(interrupt: bool) -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            interrupt,
        }
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&mut self, audio: &[u8], _signal: &InterruptSignal) -> VoiceResult<SpeakOutcome> {
        self.spoken.lock().unwrap().push(audio.len());
        Ok(if self.interrupt {
            SpeakOutcome::Interrupted
        } else {
            SpeakOutcome::Finished
        })
    }
}

#[test]
fn completed_turn_records_both_sides_and_speaks() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let speaker = RecordingSpeaker::new(false);
    let spoken = speaker.spoken.clone();
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber("I have a headache".to_string())),
        EchoGenerator::new(),
        Arc::new(SilentSynthesizer),
        Box::new(speaker),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    match outcome {
        TurnOutcome::Completed {
            user_input,
            reply,
            playback,
        } => {
            assert_eq!(user_input, "I have a headache");
            assert_eq!(reply, "You said: I have a headache");
            assert_eq!(playback, ReplyPlayback::Completed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let history = store.load_all();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(spoken.lock().unwrap().len(), 1);
}

#[test]
fn empty_transcript_records_nothing_and_skips_generation() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let generator = EchoGenerator::new();
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber(String::new())),
        generator.clone(),
        Arc::new(SilentSynthesizer),
        Box::new(RecordingSpeaker::new(false)),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    assert!(matches!(outcome, TurnOutcome::NoTranscript));
    assert!(store.load_all().is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn whitespace_transcript_records_nothing_and_skips_generation() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let generator = EchoGenerator::new();
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber("  \t\n ".to_string())),
        generator.clone(),
        Arc::new(SilentSynthesizer),
        Box::new(RecordingSpeaker::new(false)),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    assert!(matches!(outcome, TurnOutcome::NoTranscript));
    assert!(store.load_all().is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn transcript_is_stored_trimmed() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber("  where is radiology?  ".to_string())),
        EchoGenerator::new(),
        Arc::new(SilentSynthesizer),
        Box::new(RecordingSpeaker::new(false)),
        store.clone(),
    );

    turn_loop.run_turn().unwrap();
    let history = store.load_all();
    assert_eq!(history[0].content, "where is radiology?");
}

#[test]
fn transcription_failure_skips_the_turn() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FailingTranscriber),
        EchoGenerator::new(),
        Arc::new(SilentSynthesizer),
        Box::new(RecordingSpeaker::new(false)),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    assert!(matches!(outcome, TurnOutcome::NoTranscript));
    assert!(store.load_all().is_empty());
}

#[test]
fn generation_failure_falls_back_and_still_speaks() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let speaker = RecordingSpeaker::new(false);
    let spoken = speaker.spoken.clone();
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber("is the pharmacy open".to_string())),
        Arc::new(FailingGenerator),
        Arc::new(SilentSynthesizer),
        Box::new(speaker),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    match outcome {
        TurnOutcome::Completed { reply, playback, .. } => {
            assert_eq!(reply, FALLBACK_REPLY);
            assert_eq!(playback, ReplyPlayback::Completed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // The user turn survives the failed generation.
    let history = store.load_all();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "is the pharmacy open");
    assert_eq!(history[1].content, FALLBACK_REPLY);
    assert_eq!(spoken.lock().unwrap().len(), 1);
}

#[test]
fn synthesis_failure_keeps_reply_in_history_but_skips_playback() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let speaker = RecordingSpeaker::new(false);
    let spoken = speaker.spoken.clone();
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber("hello".to_string())),
        EchoGenerator::new(),
        Arc::new(FailingSynthesizer),
        Box::new(speaker),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    match outcome {
        TurnOutcome::Completed { playback, .. } => {
            assert_eq!(playback, ReplyPlayback::Skipped);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.load_all().len(), 2);
    assert!(spoken.lock().unwrap().is_empty());
}

#[test]
fn interrupt_while_listening_records_nothing() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let mut turn_loop = TurnLoop::new(
        Box::new(ScriptedSource(VecDeque::from([SegmentOutcome::Interrupted]))),
        Arc::new(FixedTranscriber("never used".to_string())),
        EchoGenerator::new(),
        Arc::new(SilentSynthesizer),
        Box::new(RecordingSpeaker::new(false)),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    assert!(matches!(outcome, TurnOutcome::Interrupted));
    assert!(store.load_all().is_empty());
}

#[test]
fn barge_in_during_reply_completes_the_turn_as_interrupted() {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let mut turn_loop = TurnLoop::new(
        speech_source(),
        Arc::new(FixedTranscriber("tell me everything".to_string())),
        EchoGenerator::new(),
        Arc::new(SilentSynthesizer),
        Box::new(RecordingSpeaker::new(true)),
        store.clone(),
    );

    let outcome = turn_loop.run_turn().unwrap();
    match outcome {
        TurnOutcome::Completed { playback, .. } => {
            assert_eq!(playback, ReplyPlayback::Interrupted);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    // Both turns stay in history even though the reply was cut off.
    assert_eq!(store.load_all().len(), 2);
}
