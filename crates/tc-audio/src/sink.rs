//! File d'échantillons partagée avec le callback du périphérique cpal.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use tc_core::frame::AudioFrame;

/// Fixed output format: f32 / 48 kHz / stereo.
pub const SAMPLE_RATE: u32 = 48_000;
/// Output channel count.
pub const CHANNELS: usize = 2;

/// Backpressure cap on the sample FIFO, in interleaved samples
/// (4 seconds of stereo audio). `enqueue` waits below this level so a
/// fast decoder cannot buffer a whole movie into memory.
const HIGH_WATER_SAMPLES: usize = SAMPLE_RATE as usize * CHANNELS * 4;

/// State shared between the enqueue side and the device callback.
struct SinkState {
    /// Interleaved s16 FIFO drained by the callback under a short lock.
    fifo: Mutex<VecDeque<i16>>,
    /// Signalled by the callback when FIFO space frees up.
    space: Condvar,
    /// Sample frames committed to the device. Never decremented; only
    /// advanced after samples are actually written to the output
    /// buffer, so the clock freezes during underrun.
    samples_played: AtomicU64,
    /// Volume as f32 bits, applied during i16 → f32 conversion.
    volume_bits: AtomicU32,
    /// Set on close; wakes any producer blocked on backpressure.
    closed: AtomicBool,
}

impl SinkState {
    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }
}

/// Poignée partageable du sink : enqueue, volume, horloge.
///
/// Cheap to clone; every clone refers to the same FIFO and clock.
#[derive(Clone)]
pub struct AudioSink {
    state: Arc<SinkState>,
}

/// Owns the cpal stream. Not `Send`; stays on the orchestrator thread
/// while worker threads hold [`AudioSink`] clones. Dropping it stops
/// the device.
pub struct AudioOutput {
    _stream: cpal::Stream,
    sink: AudioSink,
}

impl AudioOutput {
    /// Shareable handle onto the running sink.
    #[must_use]
    pub fn sink(&self) -> AudioSink {
        self.sink.clone()
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.sink.close();
    }
}

/// Open the default output device at f32/48000/stereo and start the
/// stream.
///
/// # Errors
/// Returns an error if no output device exists or the stream cannot be
/// built in the fixed format. Callers degrade to silent playback.
pub fn start(volume: f32) -> Result<AudioOutput> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no audio output device found")?;

    let config = cpal::StreamConfig {
        channels: CHANNELS as u16,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let state = Arc::new(SinkState {
        fifo: Mutex::new(VecDeque::new()),
        space: Condvar::new(),
        samples_played: AtomicU64::new(0),
        volume_bits: AtomicU32::new(volume.to_bits()),
        closed: AtomicBool::new(false),
    });

    let callback_state = Arc::clone(&state);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mix_into(&callback_state, data);
            },
            |err| {
                log::error!("audio output error: {err}");
            },
            None,
        )
        .context("failed to build audio output stream")?;
    stream.play().context("failed to start audio output stream")?;

    log::info!("audio output started @ {SAMPLE_RATE}Hz, {CHANNELS} channels");
    Ok(AudioOutput {
        _stream: stream,
        sink: AudioSink { state },
    })
}

impl AudioSink {
    /// Append a decoded frame to the FIFO.
    ///
    /// Blocks while the FIFO sits above its high-water mark so the
    /// device drains at its own pace; returns early once the sink is
    /// closed.
    pub fn enqueue(&self, frame: AudioFrame) {
        let Ok(mut fifo) = self.state.fifo.lock() else {
            return;
        };
        while fifo.len() >= HIGH_WATER_SAMPLES {
            if self.state.closed.load(Ordering::Relaxed) {
                return;
            }
            match self
                .state
                .space
                .wait_timeout(fifo, Duration::from_millis(50))
            {
                Ok((guard, _)) => fifo = guard,
                Err(_) => return,
            }
        }
        if self.state.closed.load(Ordering::Relaxed) {
            return;
        }
        fifo.extend(frame.samples);
    }

    /// Playback position in seconds: `samples_played / 48000`.
    ///
    /// Monotonically non-decreasing; readable from any thread without
    /// blocking the device callback.
    #[must_use]
    pub fn playback_time(&self) -> f64 {
        self.state.samples_played.load(Ordering::Relaxed) as f64 / f64::from(SAMPLE_RATE)
    }

    /// Set the playback volume. Pause mutes with 0.0 while the clock
    /// keeps advancing over buffered samples.
    pub fn set_volume(&self, volume: f32) {
        self.state
            .volume_bits
            .store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Current volume scalar.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.state.volume()
    }

    /// Mark the sink closed and wake blocked producers. Idempotent.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::Relaxed);
        self.state.space.notify_all();
    }
}

/// Fill one device buffer from the FIFO.
///
/// Underrun policy: an empty FIFO yields pure silence and leaves
/// `samples_played` untouched, freezing the clock until audio arrives.
/// A partial fill advances the clock only by the frames delivered.
fn mix_into(state: &SinkState, out: &mut [f32]) {
    out.fill(0.0);

    let volume = state.volume();
    let Ok(mut fifo) = state.fifo.lock() else {
        return;
    };
    if fifo.is_empty() {
        return;
    }

    let take = fifo.len().min(out.len());
    for slot in out.iter_mut().take(take) {
        if let Some(sample) = fifo.pop_front() {
            *slot = f32::from(sample) / 32768.0 * volume;
        }
    }
    drop(fifo);

    state.space.notify_one();
    state
        .samples_played
        .fetch_add((take / CHANNELS) as u64, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(volume: f32) -> Arc<SinkState> {
        Arc::new(SinkState {
            fifo: Mutex::new(VecDeque::new()),
            space: Condvar::new(),
            samples_played: AtomicU64::new(0),
            volume_bits: AtomicU32::new(volume.to_bits()),
            closed: AtomicBool::new(false),
        })
    }

    fn push(state: &SinkState, samples: &[i16]) {
        state.fifo.lock().unwrap().extend(samples.iter().copied());
    }

    #[test]
    fn underrun_emits_silence_and_freezes_clock() {
        let state = test_state(1.0);
        let mut out = [0.5f32; 8];
        mix_into(&state, &mut out);
        assert!(out.iter().all(|&s| s == 0.0), "buffer fully silenced");
        assert_eq!(state.samples_played.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn full_buffer_advances_by_frames() {
        let state = test_state(1.0);
        push(&state, &[16384; 8]);
        let mut out = [0.0f32; 8];
        mix_into(&state, &mut out);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-4, "16384/32768 scales to 0.5, got {s}");
        }
        // 8 interleaved samples over 2 channels = 4 frames.
        assert_eq!(state.samples_played.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn partial_fill_zero_pads_and_advances_partially() {
        let state = test_state(1.0);
        push(&state, &[-32768; 4]);
        let mut out = [0.9f32; 8];
        mix_into(&state, &mut out);
        for &s in &out[..4] {
            assert!((s + 1.0).abs() < 1e-4);
        }
        assert!(out[4..].iter().all(|&s| s == 0.0), "tail is silence");
        assert_eq!(state.samples_played.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn volume_scales_conversion() {
        let state = test_state(0.5);
        push(&state, &[32767; 2]);
        let mut out = [0.0f32; 2];
        mix_into(&state, &mut out);
        assert!((out[0] - 0.5).abs() < 1e-3);

        let sink = AudioSink {
            state: Arc::clone(&state),
        };
        sink.set_volume(0.0);
        push(&state, &[32767; 2]);
        let mut out = [0.0f32; 2];
        mix_into(&state, &mut out);
        assert!(out.iter().all(|&s| s == 0.0), "muted output is silent");
        assert_eq!(
            state.samples_played.load(Ordering::Relaxed),
            2,
            "clock still advances while muted"
        );
    }

    #[test]
    fn playback_time_is_monotonic() {
        let state = test_state(1.0);
        let sink = AudioSink {
            state: Arc::clone(&state),
        };
        let mut last = sink.playback_time();
        for _ in 0..10 {
            push(&state, &[0; 96]);
            let mut out = [0.0f32; 96];
            mix_into(&state, &mut out);
            let now = sink.playback_time();
            assert!(now >= last);
            last = now;
        }
        // 10 × 48 frames at 48 kHz = 10 ms.
        assert!((last - 0.01).abs() < 1e-9);
    }

    #[test]
    fn enqueue_after_close_is_dropped() {
        let state = test_state(1.0);
        let sink = AudioSink {
            state: Arc::clone(&state),
        };
        sink.close();
        sink.enqueue(AudioFrame {
            samples: vec![1; 4],
            sample_rate: SAMPLE_RATE,
            channels: 2,
            pts: 0.0,
        });
        assert!(state.fifo.lock().unwrap().is_empty());
    }
}
