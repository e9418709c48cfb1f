//! Barge-in: detect the user talking over the assistant and kill playback.
//!
//! The monitor runs its own small-block capture while a reply is playing.
//! Detection is the same energy measure the segmenter uses, with its own
//! independently tuned threshold plus a short cooldown so one shout does not
//! fire twice on residual audio.

use crate::audio::{AudioCapture, AudioConfig, CaptureHandle};
use crate::error::VoiceResult;
use crate::playback::PlaybackHandle;
use crate::vad::block_energy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use ward_core::EngineSettings;

/// One-shot latch between the monitor thread and the turn loop.
///
/// `raise` latches it, `take` consumes it. Exactly one `take` observes each
/// raise, so an interrupt is handled once even with several observers polling.
#[derive(Clone, Default)]
pub struct InterruptSignal(Arc<AtomicBool>);

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the signal. Returns true if this call raised it (it was clear).
    pub fn raise(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Consume the signal. Returns true if it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    /// Peek without consuming.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pure barge-in decision: energy strictly above the threshold triggers,
/// unless a previous trigger happened within the cooldown window. Timestamps
/// are stream offsets, so the decision is wall-clock free.
pub struct InterruptDetector {
    threshold: f32,
    cooldown: Duration,
    last_trigger: Option<Duration>,
}

impl InterruptDetector {
    pub fn new(threshold: f32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            last_trigger: None,
        }
    }

    pub fn observe(&mut self, energy: f32, at: Duration) -> bool {
        if energy <= self.threshold {
            return false;
        }
        if let Some(last) = self.last_trigger {
            if at.saturating_sub(last) < self.cooldown {
                return false;
            }
        }
        self.last_trigger = Some(at);
        true
    }
}

/// Live barge-in monitor. Owns a capture thread for the duration of one
/// playback; stopped (and the capture joined) as soon as the reply ends.
pub struct InterruptMonitor {
    capture: CaptureHandle,
}

impl InterruptMonitor {
    /// Start monitoring. Fires only while `playback` is audible: it latches
    /// `signal` and kills the playback. Detection while the sink is silent is
    /// ignored, the segmenter handles that speech instead.
    pub fn start(
        settings: &EngineSettings,
        signal: InterruptSignal,
        playback: PlaybackHandle,
    ) -> VoiceResult<Self> {
        let mut detector =
            InterruptDetector::new(settings.interrupt_threshold, settings.interrupt_cooldown);

        let capture = AudioCapture::open_with_callback(AudioConfig::interrupt(), move |block| {
            if !playback.is_playing() {
                return;
            }
            let energy = block_energy(&block.samples);
            if detector.observe(energy, block.offset) {
                info!(target: "ward::voice", energy, "barge-in detected, stopping playback");
                if signal.raise() {
                    playback.stop();
                }
            }
        })?;

        Ok(Self { capture })
    }

    pub fn stop(self) {
        self.capture.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn signal_raise_take_round_trip() {
        let signal = InterruptSignal::new();
        assert!(!signal.is_raised());
        assert!(signal.raise());
        assert!(signal.is_raised());
        assert!(signal.take());
        assert!(!signal.is_raised());
        assert!(!signal.take());
    }

    #[test]
    fn second_raise_while_latched_reports_false() {
        let signal = InterruptSignal::new();
        assert!(signal.raise());
        assert!(!signal.raise());
        // Still a single latched interrupt.
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn clones_share_the_latch() {
        let signal = InterruptSignal::new();
        let clone = signal.clone();
        assert!(signal.raise());
        assert!(clone.take());
        assert!(!signal.is_raised());
    }

    #[test]
    fn detector_triggers_above_threshold_only() {
        let mut detector = InterruptDetector::new(0.01, Duration::from_millis(100));
        assert!(!detector.observe(0.005, 0 * MS));
        assert!(!detector.observe(0.01, 32 * MS)); // strictly greater-than
        assert!(detector.observe(0.02, 64 * MS));
    }

    #[test]
    fn detector_respects_cooldown() {
        let mut detector = InterruptDetector::new(0.01, Duration::from_millis(100));
        assert!(detector.observe(0.5, 0 * MS));
        assert!(!detector.observe(0.5, 32 * MS));
        assert!(!detector.observe(0.5, 99 * MS));
        assert!(detector.observe(0.5, 100 * MS));
    }

    #[test]
    fn continuous_speech_after_burst_yields_one_interrupt_action() {
        // A 50ms burst followed by 500ms of continuous loud audio. The
        // detector refires after each cooldown window, but the signal latch
        // admits exactly one action until it is consumed, which is how the
        // monitor callback combines them.
        let mut detector = InterruptDetector::new(0.01, Duration::from_millis(100));
        let signal = InterruptSignal::new();

        let mut actions = 0;
        let mut fires = 0;
        let mut at = Duration::ZERO;
        // 32ms blocks, as with 512 samples at 16kHz.
        while at <= Duration::from_millis(550) {
            if detector.observe(0.5, at) {
                fires += 1;
                if signal.raise() {
                    actions += 1;
                }
            }
            at += 32 * MS;
        }

        assert!(fires > 1);
        assert_eq!(actions, 1);
        // The single latched interrupt is consumed exactly once.
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn quiet_blocks_do_not_reset_cooldown() {
        let mut detector = InterruptDetector::new(0.01, Duration::from_millis(100));
        assert!(detector.observe(0.5, 0 * MS));
        assert!(!detector.observe(0.0, 50 * MS));
        assert!(detector.observe(0.5, 150 * MS));
    }
}
