//! Energy-threshold speech detection and utterance segmentation.
//!
//! A block counts as speech when its energy is strictly above the threshold.
//! Segmentation collects every block from speech onset onward (quiet blocks
//! inside an utterance are kept) and finalizes once the trailing silence
//! window elapses. Bursts shorter than the minimum speech duration are
//! discarded as noise and listening continues.
//!
//! The state machine is driven entirely by block offsets, which the capture
//! layer derives from sample counts, so segmentation for a given sample
//! stream is reproducible.

use crate::audio::{AudioBlock, BlockQueue};
use crate::interrupt::InterruptSignal;
use std::time::Duration;
use tracing::{debug, info};

/// Fixed gain applied to the raw L2 norm before thresholding.
const ENERGY_GAIN: f32 = 10.0;

/// Energy of one block: L2 norm of the samples times a fixed gain.
pub fn block_energy(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum::<f32>().sqrt() * ENERGY_GAIN
}

/// Segmentation tuning.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Blocks with energy strictly above this count as speech.
    pub threshold: f32,
    /// Trailing silence that finalizes an utterance.
    pub silence_duration: Duration,
    /// Utterances shorter than this are discarded as noise.
    pub min_speech_duration: Duration,
    pub sample_rate: u32,
    /// How long the segmenter sleeps when the capture queue is empty.
    pub poll_interval: Duration,
}

impl VadConfig {
    pub fn new(settings: &ward_core::EngineSettings, sample_rate: u32) -> Self {
        Self {
            threshold: settings.vad_threshold,
            silence_duration: settings.silence_duration,
            min_speech_duration: settings.min_speech_duration,
            sample_rate,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self::new(&ward_core::EngineSettings::default(), 16_000)
    }
}

/// One finalized stretch of user speech.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// All samples from speech onset through the trailing silence.
    pub samples: Vec<f32>,
    /// Stream offset of the first speech block.
    pub started_at: Duration,
    /// Stream offset of the end of the last speech block.
    pub ended_at: Duration,
    pub sample_rate: u32,
}

impl Utterance {
    /// Speech length, excluding the trailing silence window.
    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_sub(self.started_at)
    }
}

/// Pure segmentation state machine. Feed blocks in stream order; yields an
/// utterance when one finalizes.
pub struct SegmenterState {
    config: VadConfig,
    buffer: Vec<f32>,
    started_at: Option<Duration>,
    last_speech_end: Duration,
}

impl SegmenterState {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            started_at: None,
            last_speech_end: Duration::ZERO,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.started_at.is_some()
    }

    /// Drop any partially collected speech.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.started_at = None;
    }

    pub fn push_block(&mut self, block: &AudioBlock) -> Option<Utterance> {
        let energy = block_energy(&block.samples);
        let block_end = block.offset
            + Duration::from_secs_f64(
                block.samples.len() as f64 / self.config.sample_rate as f64,
            );
        let is_speech = energy > self.config.threshold;

        match self.started_at {
            None => {
                if is_speech {
                    debug!(target: "ward::vad", energy, offset_ms = block.offset.as_millis() as u64, "speech started");
                    self.buffer.clear();
                    self.buffer.extend_from_slice(&block.samples);
                    self.started_at = Some(block.offset);
                    self.last_speech_end = block_end;
                }
                None
            }
            Some(started_at) => {
                // Quiet blocks inside an utterance are kept so the
                // transcriber sees the whole stretch.
                self.buffer.extend_from_slice(&block.samples);
                if is_speech {
                    self.last_speech_end = block_end;
                    return None;
                }

                // Strictly greater-than: the window must be exceeded, not met.
                let silence = block_end.saturating_sub(self.last_speech_end);
                if silence <= self.config.silence_duration {
                    return None;
                }

                let speech_len = self.last_speech_end.saturating_sub(started_at);
                let samples = std::mem::take(&mut self.buffer);
                let ended_at = self.last_speech_end;
                self.started_at = None;

                if speech_len < self.config.min_speech_duration {
                    debug!(
                        target: "ward::vad",
                        speech_ms = speech_len.as_millis() as u64,
                        "discarding short burst"
                    );
                    return None;
                }

                info!(
                    target: "ward::vad",
                    speech_ms = speech_len.as_millis() as u64,
                    samples = samples.len(),
                    "utterance finalized"
                );
                Some(Utterance {
                    samples,
                    started_at,
                    ended_at,
                    sample_rate: self.config.sample_rate,
                })
            }
        }
    }
}

/// What ended a wait for speech.
#[derive(Debug)]
pub enum SegmentOutcome {
    Utterance(Utterance),
    /// A barge-in was raised while waiting; pending speech was dropped.
    Interrupted,
}

/// Pulls blocks from a capture queue and blocks until an utterance finalizes
/// or an interrupt is raised.
pub struct Segmenter {
    queue: BlockQueue,
    state: SegmenterState,
    poll_interval: Duration,
}

impl Segmenter {
    pub fn new(queue: BlockQueue, config: VadConfig) -> Self {
        Self {
            queue,
            poll_interval: config.poll_interval,
            state: SegmenterState::new(config),
        }
    }

    pub fn wait(&mut self, signal: &InterruptSignal) -> SegmentOutcome {
        loop {
            if signal.take() {
                self.state.reset();
                self.queue.clear();
                return SegmentOutcome::Interrupted;
            }
            match self.queue.pop() {
                Some(block) => {
                    if let Some(utterance) = self.state.push_block(&block) {
                        return SegmentOutcome::Utterance(utterance);
                    }
                }
                None => std::thread::sleep(self.poll_interval),
            }
        }
    }
}
