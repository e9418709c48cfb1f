//! Microphone capture on a dedicated thread.
//!
//! CPAL streams are not `Send`, so each capture owns its stream on its own
//! thread and hands fixed-size blocks to the rest of the engine through a
//! bounded queue. Block timestamps are derived from the sample count, not the
//! wall clock, so downstream timing (silence windows, minimum durations) is
//! deterministic for a given sample stream.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

/// Samples per block for speech detection.
pub const VAD_BLOCK_SIZE: usize = 1024;

/// Samples per block for the barge-in monitor. Smaller for lower latency.
pub const INTERRUPT_BLOCK_SIZE: usize = 512;

/// Default bound on queued blocks (~16s of audio at the VAD block size).
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How long to wait before rebuilding a failed capture stream.
const REBUILD_BACKOFF: Duration = Duration::from_millis(500);

/// Capture format. Mono 16kHz f32 throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per emitted block.
    pub block_size: usize,
}

impl AudioConfig {
    /// Configuration for the speech-detection capture.
    pub fn vad() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            block_size: VAD_BLOCK_SIZE,
        }
    }

    /// Configuration for the barge-in monitor capture.
    pub fn interrupt() -> Self {
        Self {
            block_size: INTERRUPT_BLOCK_SIZE,
            ..Self::vad()
        }
    }

    /// Duration of one block at this configuration's sample rate.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::vad()
    }
}

/// One fixed-size block of captured samples.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Monotonic block counter, continuous across stream rebuilds.
    pub seq: u64,
    /// Normalized f32 samples.
    pub samples: Vec<f32>,
    /// Stream position of the first sample, derived from the sample count.
    pub offset: Duration,
}

/// Bounded FIFO between the capture thread and the segmenter. When full, the
/// oldest block is dropped so capture never blocks the audio callback.
#[derive(Clone)]
pub struct BlockQueue {
    inner: Arc<Mutex<VecDeque<AudioBlock>>>,
    capacity: usize,
}

impl BlockQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, block: AudioBlock) {
        let mut queue = self.inner.lock().expect("block queue mutex poisoned");
        if queue.len() >= self.capacity {
            queue.pop_front();
            warn!(target: "ward::audio", "block queue full, dropping oldest block");
        }
        queue.push_back(block);
    }

    pub fn pop(&self) -> Option<AudioBlock> {
        self.inner
            .lock()
            .expect("block queue mutex poisoned")
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("block queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("block queue mutex poisoned")
            .clear();
    }
}

/// Owns the capture thread. Dropping (or calling `stop`) shuts the stream
/// down and joins the thread.
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Shared cursor so sequence numbers and offsets stay continuous when the
/// stream is rebuilt after a device error.
#[derive(Default)]
struct CaptureCursor {
    next_seq: AtomicU64,
    samples_emitted: AtomicU64,
}

/// Microphone capture entry points.
pub struct AudioCapture;

impl AudioCapture {
    /// Open the default input device and start capturing into a new queue.
    ///
    /// The capture thread rebuilds its stream after device errors, with a
    /// short backoff, until the handle is stopped. Returns an error if the
    /// initial stream cannot be built.
    pub fn open(config: AudioConfig) -> VoiceResult<(CaptureHandle, BlockQueue)> {
        let queue = BlockQueue::new(DEFAULT_QUEUE_CAPACITY);
        let sink_queue = queue.clone();
        let handle = Self::spawn(config, move |block| sink_queue.push(block))?;
        Ok((handle, queue))
    }

    /// Open a capture that invokes `on_block` for every full block instead of
    /// queueing. Used by the barge-in monitor.
    pub fn open_with_callback<F>(config: AudioConfig, on_block: F) -> VoiceResult<CaptureHandle>
    where
        F: FnMut(AudioBlock) + Send + 'static,
    {
        Self::spawn(config, on_block)
    }

    fn spawn<F>(config: AudioConfig, on_block: F) -> VoiceResult<CaptureHandle>
    where
        F: FnMut(AudioBlock) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<VoiceResult<()>>();

        let thread = std::thread::Builder::new()
            .name("ward-capture".to_string())
            .spawn(move || {
                capture_thread(config, thread_stop, on_block, ready_tx);
            })
            .map_err(|e| VoiceError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureHandle {
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            // The thread dropped its sender without reporting; the startup
            // handshake channel is broken.
            Err(_) => {
                let _ = thread.join();
                Err(VoiceError::ChannelSend(
                    "capture thread exited before startup".to_string(),
                ))
            }
        }
    }
}

fn capture_thread<F>(
    config: AudioConfig,
    stop: Arc<AtomicBool>,
    on_block: F,
    ready_tx: mpsc::Sender<VoiceResult<()>>,
) where
    F: FnMut(AudioBlock) + Send + 'static,
{
    let cursor = Arc::new(CaptureCursor::default());
    let sink = Arc::new(Mutex::new(on_block));
    let mut announced = false;

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let failed = Arc::new(AtomicBool::new(false));
        let stream = build_input_stream(&config, cursor.clone(), sink.clone(), failed.clone());

        match stream {
            Ok(stream) => {
                if !announced {
                    let _ = ready_tx.send(Ok(()));
                    announced = true;
                }
                // Hold the stream on this thread until stop or failure.
                while !stop.load(Ordering::SeqCst) && !failed.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                if failed.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
                    warn!(target: "ward::audio", "capture stream failed, rebuilding");
                    std::thread::sleep(REBUILD_BACKOFF);
                }
            }
            Err(e) => {
                if !announced {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                warn!(target: "ward::audio", "capture stream rebuild failed: {}", e);
                std::thread::sleep(REBUILD_BACKOFF);
            }
        }
    }
}

fn build_input_stream(
    config: &AudioConfig,
    cursor: Arc<CaptureCursor>,
    sink: Arc<Mutex<dyn FnMut(AudioBlock) + Send>>,
    failed: Arc<AtomicBool>,
) -> VoiceResult<cpal::Stream> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| VoiceError::DeviceUnavailable("no input device available".to_string()))?;

    info!(
        target: "ward::audio",
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate = config.sample_rate,
        block_size = config.block_size,
        "opening input stream"
    );

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let block_size = config.block_size;
    let sample_rate = config.sample_rate;
    let mut buffer: Vec<f32> = Vec::with_capacity(block_size);
    let err_failed = failed.clone();

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for &sample in data {
                buffer.push(sample);
                if buffer.len() >= block_size {
                    let seq = cursor.next_seq.fetch_add(1, Ordering::Relaxed);
                    let emitted = cursor
                        .samples_emitted
                        .fetch_add(block_size as u64, Ordering::Relaxed);
                    let block = AudioBlock {
                        seq,
                        samples: std::mem::replace(
                            &mut buffer,
                            Vec::with_capacity(block_size),
                        ),
                        offset: Duration::from_secs_f64(emitted as f64 / sample_rate as f64),
                    };
                    let mut emit = sink.lock().expect("capture sink mutex poisoned");
                    (*emit)(block);
                }
            }
        },
        move |err| {
            warn!(target: "ward::audio", "input stream error: {}", err);
            err_failed.store(true, Ordering::SeqCst);
        },
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vad_config_defaults() {
        let config = AudioConfig::vad();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.block_size, 1024);
    }

    #[test]
    fn interrupt_config_uses_smaller_blocks() {
        let config = AudioConfig::interrupt();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.sample_rate, 16_000);
    }

    #[test]
    fn block_duration_at_16khz() {
        let config = AudioConfig::vad();
        assert_eq!(config.block_duration(), Duration::from_micros(64_000));
    }

    #[test]
    fn queue_drops_oldest_when_full() {
        let queue = BlockQueue::new(2);
        for seq in 0..3 {
            queue.push(AudioBlock {
                seq,
                samples: vec![0.0; 4],
                offset: Duration::ZERO,
            });
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|b| b.seq), Some(1));
        assert_eq!(queue.pop().map(|b| b.seq), Some(2));
        assert!(queue.pop().is_none());
    }

    #[test]
    #[ignore = "requires a microphone"]
    fn open_default_device() {
        let result = AudioCapture::open(AudioConfig::vad());
        if let Ok((handle, queue)) = result {
            std::thread::sleep(Duration::from_millis(200));
            let _ = queue.len();
            handle.stop();
        }
    }
}
