//! Orchestration du pipeline : files bornées, threads, politique de sync.
//!
//! Data flow: decoder → [video queue] → ascii worker → [ascii queue] →
//! presenter, with the audio drain feeding the sink in parallel. The
//! audio clock is the single source of truth for presentation time.
//! Shutdown is cooperative: the `running` flag flips, the decoder
//! stops, and every stage unblocks through channel disconnection.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flume::Receiver;

use tc_audio::{AudioOutput, AudioSink};
use tc_core::config::RendererConfig;
use tc_core::frame::AsciiFrame;
use tc_export::{ExportConfig, Exporter};
use tc_media::MediaDecoder;
use tc_render::AsciiRenderer;
use tc_term::TerminalSink;

use crate::control;
use crate::stats::{format_stats_line, FpsCounter};

/// Bounded stage queues. The decoder's own queues sit upstream; these
/// bound the in-flight work between workers.
const VIDEO_QUEUE: usize = 8;
const ASCII_QUEUE: usize = 4;

/// Presenter tolerance: ahead of the clock by more than this, sleep.
const SYNC_AHEAD_SECS: f64 = 0.010;
/// Behind the clock by more than this, drop the frame.
const SYNC_BEHIND_SECS: f64 = -0.050;

/// Pause poll interval and the slice used for interruptible sleeps.
const PAUSE_POLL: Duration = Duration::from_millis(20);
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Everything the orchestrator resolved from the CLI.
pub struct PipelineConfig {
    /// Initial renderer configuration.
    pub renderer: RendererConfig,
    /// Fixed presentation rate; 0 follows stream PTS.
    pub target_fps: f64,
    /// Volume scalar in [0.0, 2.0].
    pub volume: f32,
    /// Whether to draw the status line.
    pub show_stats: bool,
    /// Terminal write budget in MB/s.
    pub max_write_mbps: f64,
    /// Export instead of terminal playback.
    pub export: Option<ExportConfig>,
}

/// Flags and counters shared by every worker thread.
pub struct PipelineShared {
    running: AtomicBool,
    paused: AtomicBool,
    rendered: AtomicU64,
    dropped: AtomicU64,
}

impl PipelineShared {
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            rendered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Request cooperative shutdown.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Toggle pause; returns the new state.
    pub fn toggle_pause(&self) -> bool {
        let next = !self.paused();
        self.paused.store(next, Ordering::Relaxed);
        next
    }

    #[must_use]
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for PipelineShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Presenter decision for one frame given `diff = pts − clock`.
#[derive(Debug, PartialEq)]
pub(crate) enum PaceAction {
    /// Write the frame now.
    Present,
    /// Sleep this long, then present.
    Sleep(Duration),
    /// Too late, discard the frame.
    Drop,
}

/// Audio-driven sync policy: 10 ms of slack ahead, 50 ms behind.
pub(crate) fn pace(diff_secs: f64) -> PaceAction {
    if diff_secs > SYNC_AHEAD_SECS {
        PaceAction::Sleep(Duration::from_secs_f64(diff_secs))
    } else if diff_secs < SYNC_BEHIND_SECS {
        PaceAction::Drop
    } else {
        PaceAction::Present
    }
}

/// Sleep in slices so a shutdown request interrupts even a multi-second
/// PTS jump.
fn sleep_while_running(total: Duration, shared: &PipelineShared) {
    let deadline = Instant::now() + total;
    while shared.running() {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

enum PresentTarget {
    Terminal(TerminalSink),
    Export(Exporter),
}

/// Le pipeline assemblé : décodeur, renderer, sinks, threads.
pub struct Pipeline {
    decoder: Arc<MediaDecoder>,
    renderer: AsciiRenderer,
    shared: Arc<PipelineShared>,
    audio: Option<AudioOutput>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Wire the components together. Audio device failure degrades to
    /// silent playback with steady-clock pacing.
    pub fn new(
        decoder: Arc<MediaDecoder>,
        shared: Arc<PipelineShared>,
        config: PipelineConfig,
    ) -> Self {
        let audio = if decoder.audio_active() {
            match tc_audio::start(config.volume) {
                Ok(output) => Some(output),
                Err(e) => {
                    log::warn!("audio disabled: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            decoder,
            renderer: AsciiRenderer::new(config.renderer),
            shared,
            audio,
            config,
        }
    }

    /// Run to end of stream or shutdown. Joins every worker before
    /// tearing down the terminal, the audio device, and the exporter.
    ///
    /// # Errors
    /// Returns an error on init failures (terminal, exporter, decoder
    /// spawn). Worker-side errors degrade or log instead.
    pub fn run(self) -> Result<()> {
        let target = if let Some(export_cfg) = &self.config.export {
            PresentTarget::Export(Exporter::open(export_cfg)?)
        } else {
            let mut sink = TerminalSink::new(self.config.max_write_mbps);
            sink.initialize().context("failed to initialize terminal")?;
            PresentTarget::Terminal(sink)
        };

        self.decoder.start()?;

        let (video_tx, video_rx) = flume::bounded(VIDEO_QUEUE);
        let (ascii_tx, ascii_rx) = flume::bounded(ASCII_QUEUE);

        let mut workers = Vec::new();

        // Decode drain: decoder → video queue.
        {
            let decoder = Arc::clone(&self.decoder);
            let shared = Arc::clone(&self.shared);
            workers.push(
                thread::Builder::new()
                    .name("decode-drain".into())
                    .spawn(move || {
                        while shared.running() {
                            let Some(frame) = decoder.pop_video_frame() else {
                                break;
                            };
                            if video_tx.send(frame).is_err() {
                                break;
                            }
                        }
                    })?,
            );
        }

        // Ascii worker: video queue → renderer → ascii queue.
        {
            let renderer = self.renderer.clone();
            workers.push(
                thread::Builder::new()
                    .name("ascii-worker".into())
                    .spawn(move || {
                        while let Ok(frame) = video_rx.recv() {
                            let ascii = renderer.render(&frame);
                            if ascii_tx.send(ascii).is_err() {
                                break;
                            }
                        }
                    })?,
            );
        }

        // Audio drain: decoder → sink. Runs even when the device
        // failed so the decoder's audio queue keeps flowing. Joined
        // separately: it may sit blocked on sink backpressure after
        // the video side has finished.
        let audio_worker = if self.decoder.audio_active() {
            let decoder = Arc::clone(&self.decoder);
            let shared = Arc::clone(&self.shared);
            let sink = self.audio.as_ref().map(AudioOutput::sink);
            Some(
                thread::Builder::new()
                    .name("audio-drain".into())
                    .spawn(move || {
                        while shared.running() {
                            let Some(frame) = decoder.pop_audio_frame() else {
                                break;
                            };
                            if let Some(sink) = &sink {
                                sink.enqueue(frame);
                            }
                        }
                    })?,
            )
        } else {
            None
        };

        // Presenter: ascii queue → terminal or exporter.
        {
            let shared = Arc::clone(&self.shared);
            let clock = self.audio.as_ref().map(AudioOutput::sink);
            let target_fps = self.config.target_fps;
            let show_stats = self.config.show_stats;
            workers.push(
                thread::Builder::new()
                    .name("presenter".into())
                    .spawn(move || {
                        presenter_loop(&ascii_rx, target, clock, &shared, target_fps, show_stats);
                    })?,
            );
        }

        // Keyboard poller, terminal mode only. Joined after the flag
        // flips, once playback itself has finished.
        let keyboard = if self.config.export.is_none() {
            let shared = Arc::clone(&self.shared);
            let renderer = self.renderer.clone();
            let sink = self.audio.as_ref().map(AudioOutput::sink);
            let decoder = Arc::clone(&self.decoder);
            let volume = self.config.volume;
            Some(
                thread::Builder::new()
                    .name("keyboard".into())
                    .spawn(move || {
                        let stop = || {
                            shared.request_stop();
                            decoder.stop();
                        };
                        control::run(&shared, &renderer, sink.as_ref(), volume, &stop);
                    })?,
            )
        } else {
            None
        };

        // Video side first: decode drain, ascii worker, presenter.
        for worker in workers {
            let _ = worker.join();
        }

        // Playback is over. Flip the flag, wake anything still
        // blocked, then collect the audio drain and the keyboard.
        self.shared.request_stop();
        if let Some(sink) = self.audio.as_ref().map(AudioOutput::sink) {
            sink.close();
        }
        self.decoder.stop();
        if let Some(worker) = audio_worker {
            let _ = worker.join();
        }
        if let Some(keyboard) = keyboard {
            let _ = keyboard.join();
        }

        // The terminal and exporter were closed by the presenter on
        // its way out; the audio device stops here.
        drop(self.audio);

        log::info!(
            "playback finished: {} rendered, {} dropped",
            self.shared.rendered(),
            self.shared.dropped()
        );
        Ok(())
    }
}

/// Pop ascii frames and apply the sync policy until end of stream.
fn presenter_loop(
    ascii_rx: &Receiver<AsciiFrame>,
    mut target: PresentTarget,
    clock: Option<AudioSink>,
    shared: &PipelineShared,
    target_fps: f64,
    show_stats: bool,
) {
    let clock_start = Instant::now();
    let mut fps_counter = FpsCounter::new(60);

    while let Ok(frame) = ascii_rx.recv() {
        while shared.paused() && shared.running() {
            thread::sleep(PAUSE_POLL);
        }
        if !shared.running() {
            break;
        }

        match &mut target {
            PresentTarget::Export(exporter) => {
                // Export consumes every frame at the encoder's fixed
                // rate; no pacing, no drops.
                if let Err(e) = exporter.write_frame(&frame) {
                    log::warn!("export error: {e:#}");
                }
            }
            PresentTarget::Terminal(sink) => {
                let pts = if target_fps > 0.0 {
                    shared.rendered() as f64 / target_fps
                } else {
                    frame.pts
                };

                let action = match &clock {
                    Some(clock) => pace(pts - clock.playback_time()),
                    None => {
                        // No audio: steady clock from presenter start,
                        // never drop.
                        let diff = pts - clock_start.elapsed().as_secs_f64();
                        if diff > 0.0 {
                            PaceAction::Sleep(Duration::from_secs_f64(diff))
                        } else {
                            PaceAction::Present
                        }
                    }
                };

                match action {
                    PaceAction::Drop => {
                        shared.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    PaceAction::Sleep(duration) => {
                        sleep_while_running(duration, shared);
                        if !shared.running() {
                            break;
                        }
                    }
                    PaceAction::Present => {}
                }

                if let Err(e) = sink.present(&frame) {
                    log::warn!("terminal write error: {e}");
                }
            }
        }

        shared.rendered.fetch_add(1, Ordering::Relaxed);
        fps_counter.tick();

        if show_stats {
            let line = format_stats_line(
                fps_counter.fps(),
                shared.rendered(),
                shared.dropped(),
                shared.paused(),
            );
            match &mut target {
                PresentTarget::Terminal(sink) => {
                    let _ = sink.print_stats(&line);
                }
                PresentTarget::Export(_) => {
                    print!("[export] {line}\r");
                    let _ = std::io::stdout().flush();
                }
            }
        }
    }

    match target {
        PresentTarget::Terminal(mut sink) => sink.teardown(),
        PresentTarget::Export(exporter) => {
            if let Err(e) = exporter.close() {
                log::error!("export finalize error: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_frame_is_dropped() {
        // Frame at 1.0 s while the audio clock reads 2.0 s.
        assert_eq!(pace(1.0 - 2.0), PaceAction::Drop);
    }

    #[test]
    fn early_frame_sleeps_the_gap() {
        // Frame at 1.0 s, clock at 0.5 s: sleep roughly 500 ms.
        match pace(1.0 - 0.5) {
            PaceAction::Sleep(d) => assert!((d.as_secs_f64() - 0.5).abs() < 1e-9),
            other => panic!("expected sleep, got {other:?}"),
        }
    }

    #[test]
    fn on_time_frame_presents_immediately() {
        assert_eq!(pace(0.0), PaceAction::Present);
        assert_eq!(pace(0.005), PaceAction::Present);
        assert_eq!(pace(-0.030), PaceAction::Present);
    }

    #[test]
    fn thresholds_are_exclusive() {
        assert_eq!(pace(SYNC_AHEAD_SECS), PaceAction::Present);
        assert_eq!(pace(SYNC_BEHIND_SECS), PaceAction::Present);
        assert!(matches!(pace(SYNC_AHEAD_SECS + 1e-6), PaceAction::Sleep(_)));
        assert_eq!(pace(SYNC_BEHIND_SECS - 1e-6), PaceAction::Drop);
    }

    #[test]
    fn shared_flags_roundtrip() {
        let shared = PipelineShared::new();
        assert!(shared.running());
        assert!(!shared.paused());
        assert!(shared.toggle_pause());
        assert!(!shared.toggle_pause());
        shared.request_stop();
        assert!(!shared.running());
    }

    #[test]
    fn interrupted_sleep_returns_early() {
        let shared = PipelineShared::new();
        shared.request_stop();
        let start = Instant::now();
        sleep_while_running(Duration::from_secs(5), &shared);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
