//! Assistant speech playback with a hard kill switch.
//!
//! Rodio's `OutputStream` is not `Send` and must outlive the sink, so the
//! controller owns both and stays on the thread that created it. A cloneable
//! `PlaybackHandle` is shared with the barge-in monitor, which uses `stop` as
//! the kill switch when the user talks over the assistant.

use crate::error::{VoiceError, VoiceResult};
use crate::interrupt::InterruptSignal;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Where a playback attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    /// Killed mid-stream by a barge-in.
    Stopped,
    /// Ran to completion.
    Finished,
}

/// Owns the output device. Not `Send`; keep it on its creating thread.
pub struct PlaybackController {
    // Dropping the stream silences the sink, so it lives as long as the
    // controller even though nothing reads it.
    _stream: rodio::OutputStream,
    handle: PlaybackHandle,
}

impl PlaybackController {
    pub fn new() -> VoiceResult<Self> {
        let (_stream, stream_handle) = rodio::OutputStream::try_default()
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        let sink = rodio::Sink::try_new(&stream_handle)
            .map_err(|e| VoiceError::Playback(e.to_string()))?;

        info!(target: "ward::audio", "audio playback initialized");
        Ok(Self {
            _stream,
            handle: PlaybackHandle {
                sink: Arc::new(sink),
                state: Arc::new(Mutex::new(PlaybackState::Idle)),
            },
        })
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }
}

/// Cloneable control surface over the playback sink. Safe to share with the
/// barge-in monitor thread.
#[derive(Clone)]
pub struct PlaybackHandle {
    sink: Arc<rodio::Sink>,
    state: Arc<Mutex<PlaybackState>>,
}

impl PlaybackHandle {
    /// Decode and start playing one reply. Returns `PlaybackBusy` if a
    /// previous reply is still audible; replies never overlap.
    pub fn play(&self, audio: &[u8]) -> VoiceResult<()> {
        if self.is_playing() {
            return Err(VoiceError::PlaybackBusy);
        }
        let source = rodio::Decoder::new(Cursor::new(audio.to_vec()))
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        self.sink.append(source);
        // A prior stop() leaves the sink paused.
        self.sink.play();
        *self.state.lock().expect("playback state mutex poisoned") = PlaybackState::Playing;
        Ok(())
    }

    /// Kill playback immediately, discarding whatever is queued.
    pub fn stop(&self) {
        self.sink.stop();
        *self.state.lock().expect("playback state mutex poisoned") = PlaybackState::Stopped;
        info!(target: "ward::audio", "playback stopped");
    }

    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock().expect("playback state mutex poisoned")
    }

    /// Block until the current reply finishes or an interrupt is raised.
    /// The interrupt check comes first so a barge-in that empties the sink
    /// still reports as `Stopped`, not `Finished`.
    pub fn wait_until_done(&self, signal: &InterruptSignal) -> PlaybackState {
        loop {
            if signal.is_raised() {
                *self.state.lock().expect("playback state mutex poisoned") =
                    PlaybackState::Stopped;
                return PlaybackState::Stopped;
            }
            if !self.is_playing() {
                let mut state = self.state.lock().expect("playback state mutex poisoned");
                if *state != PlaybackState::Stopped {
                    *state = PlaybackState::Finished;
                }
                return *state;
            }
            std::thread::sleep(WAIT_POLL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires an audio output device"]
    fn empty_sink_reports_not_playing() {
        let controller = PlaybackController::new().unwrap();
        let handle = controller.handle();
        assert!(!handle.is_playing());
        assert_eq!(handle.state(), PlaybackState::Idle);
    }

    #[test]
    #[ignore = "requires an audio output device"]
    fn wait_on_idle_sink_finishes_immediately() {
        let controller = PlaybackController::new().unwrap();
        let handle = controller.handle();
        let signal = InterruptSignal::new();
        assert_eq!(handle.wait_until_done(&signal), PlaybackState::Finished);
    }
}
