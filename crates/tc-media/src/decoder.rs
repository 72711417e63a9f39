//! Threads lecteurs sur les pipes ffmpeg, files bornées vers le pipeline.

use std::io::{BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use flume::{Receiver, Sender};

use tc_core::frame::{AudioFrame, VideoFrame};

use crate::probe::{self, StreamInfo};

/// Internal queue bounds. Producers block when full, which pauses the
/// ffmpeg children through pipe backpressure.
const VIDEO_QUEUE: usize = 8;
const AUDIO_QUEUE: usize = 32;

/// Interleaved s16 stereo frames per emitted [`AudioFrame`].
const AUDIO_CHUNK_FRAMES: usize = 1024;
const AUDIO_CHUNK_BYTES: usize = AUDIO_CHUNK_FRAMES * 2 * 2;

/// Opening parameters for [`MediaDecoder::open`].
#[derive(Clone, Debug)]
pub struct DecoderOptions {
    /// Input path or URL, handed to ffmpeg verbatim.
    pub url: String,
    /// Whether to decode the audio track at all.
    pub enable_audio: bool,
}

struct Inner {
    video_tx: Option<Sender<VideoFrame>>,
    audio_tx: Option<Sender<AudioFrame>>,
    children: Vec<Child>,
    readers: Vec<JoinHandle<()>>,
    started: bool,
}

/// Décodeur média : un process ffmpeg par flux, threads lecteurs,
/// files bornées.
///
/// `pop_video_frame` and `pop_audio_frame` block until a frame is
/// available and return `None` at end of stream. `stop` is idempotent
/// and unblocks both.
pub struct MediaDecoder {
    info: StreamInfo,
    options: DecoderOptions,
    video_rx: Receiver<VideoFrame>,
    audio_rx: Receiver<AudioFrame>,
    inner: Mutex<Inner>,
    stopping: Arc<AtomicBool>,
}

impl MediaDecoder {
    /// Probe the input and prepare the frame queues.
    ///
    /// # Errors
    /// Returns an error if probing fails or the input has no video
    /// stream. A missing audio stream is not an error.
    pub fn open(options: DecoderOptions) -> Result<Self> {
        let info = probe::probe(&options.url)?;

        let (video_tx, video_rx) = flume::bounded(VIDEO_QUEUE);
        let (audio_tx, audio_rx) = flume::bounded(AUDIO_QUEUE);

        Ok(Self {
            info,
            options,
            video_rx,
            audio_rx,
            inner: Mutex::new(Inner {
                video_tx: Some(video_tx),
                audio_tx: Some(audio_tx),
                children: Vec::new(),
                readers: Vec::new(),
                started: false,
            }),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Probed stream geometry and timing.
    #[must_use]
    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// True when the input has audio and it was not disabled.
    #[must_use]
    pub fn audio_active(&self) -> bool {
        self.options.enable_audio && self.info.has_audio
    }

    /// Spawn the decode processes and their reader threads. Idempotent.
    ///
    /// # Errors
    /// Returns an error if an ffmpeg child cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let Ok(mut inner) = self.inner.lock() else {
            return Ok(());
        };
        if inner.started {
            return Ok(());
        }
        inner.started = true;

        // Video: raw RGB24 frames on stdout, one read_exact per frame.
        let mut video_child = Command::new("ffmpeg")
            .args([
                "-v",
                "error",
                "-i",
                &self.options.url,
                "-an",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg video decoder (is it on PATH?)")?;
        let video_stdout = video_child
            .stdout
            .take()
            .context("ffmpeg video decoder has no stdout")?;
        inner.children.push(video_child);

        let video_tx = inner.video_tx.take().context("decoder already started")?;
        let info = self.info;
        let stopping = Arc::clone(&self.stopping);
        let handle = thread::Builder::new()
            .name("decode-video".into())
            .spawn(move || read_video_frames(video_stdout, info, &video_tx, &stopping))?;
        inner.readers.push(handle);

        if self.audio_active() {
            // Audio: interleaved s16le stereo at 48 kHz.
            let mut audio_child = Command::new("ffmpeg")
                .args([
                    "-v",
                    "error",
                    "-i",
                    &self.options.url,
                    "-vn",
                    "-f",
                    "s16le",
                    "-ac",
                    "2",
                    "-ar",
                    "48000",
                    "-",
                ])
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .context("failed to spawn ffmpeg audio decoder")?;
            let audio_stdout = audio_child
                .stdout
                .take()
                .context("ffmpeg audio decoder has no stdout")?;
            inner.children.push(audio_child);

            let audio_tx = inner.audio_tx.take().context("decoder already started")?;
            let stopping = Arc::clone(&self.stopping);
            let handle = thread::Builder::new()
                .name("decode-audio".into())
                .spawn(move || read_audio_frames(audio_stdout, &audio_tx, &stopping))?;
            inner.readers.push(handle);
        } else {
            // Drop the sender so audio pops report end-of-stream.
            inner.audio_tx = None;
        }

        Ok(())
    }

    /// Next video frame, blocking. `None` at end of stream.
    #[must_use]
    pub fn pop_video_frame(&self) -> Option<VideoFrame> {
        self.video_rx.recv().ok()
    }

    /// Next audio frame, blocking. `None` at end of stream or when
    /// audio is inactive.
    #[must_use]
    pub fn pop_audio_frame(&self) -> Option<AudioFrame> {
        self.audio_rx.recv().ok()
    }

    /// Stop decoding: kill the ffmpeg children and join the readers.
    /// Idempotent; unblocks any pending pop once the queues drain.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.video_tx = None;
        inner.audio_tx = None;
        for child in &mut inner.children {
            let _ = child.kill();
        }
        for mut child in inner.children.drain(..) {
            let _ = child.wait();
        }
        for handle in inner.readers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for MediaDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Send with periodic stop checks so a full queue cannot wedge
/// shutdown. Returns false once the decoder is stopping or the
/// consumer is gone.
fn send_with_stop<T>(tx: &Sender<T>, item: T, stopping: &AtomicBool) -> bool {
    let mut pending = item;
    loop {
        match tx.send_timeout(pending, Duration::from_millis(100)) {
            Ok(()) => return true,
            Err(flume::SendTimeoutError::Timeout(back)) => {
                if stopping.load(Ordering::Relaxed) {
                    return false;
                }
                pending = back;
            }
            Err(flume::SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Read tightly packed RGB24 frames until EOF. PTS derives from the
/// frame index over the probed rate, which keeps it non-negative and
/// strictly non-decreasing.
fn read_video_frames(
    stdout: impl Read,
    info: StreamInfo,
    tx: &Sender<VideoFrame>,
    stopping: &AtomicBool,
) {
    let frame_len = (info.width * info.height * 3) as usize;
    let fps = if info.fps > 0.0 { info.fps } else { 30.0 };
    let mut reader = BufReader::new(stdout);
    let mut index = 0u64;

    loop {
        if stopping.load(Ordering::Relaxed) {
            return;
        }
        let mut data = vec![0u8; frame_len];
        if reader.read_exact(&mut data).is_err() {
            // EOF, or the child was killed. Either way the stream ends.
            break;
        }
        let frame = VideoFrame {
            width: info.width,
            height: info.height,
            data,
            pts: index as f64 / fps,
        };
        index += 1;
        if !send_with_stop(tx, frame, stopping) {
            return;
        }
    }
    log::debug!("video stream ended after {index} frames");
}

/// Read interleaved s16le stereo bytes, regroup into fixed chunks, and
/// stamp each chunk with its sample position over 48 kHz.
fn read_audio_frames(stdout: impl Read, tx: &Sender<AudioFrame>, stopping: &AtomicBool) {
    let mut reader = BufReader::new(stdout);
    let mut acc: Vec<u8> = Vec::with_capacity(AUDIO_CHUNK_BYTES * 2);
    let mut buf = vec![0u8; AUDIO_CHUNK_BYTES];
    let mut frames_sent = 0u64;

    loop {
        if stopping.load(Ordering::Relaxed) {
            return;
        }
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                acc.extend_from_slice(&buf[..n]);
                while acc.len() >= AUDIO_CHUNK_BYTES {
                    let chunk: Vec<u8> = acc.drain(..AUDIO_CHUNK_BYTES).collect();
                    if !emit_audio_chunk(&chunk, &mut frames_sent, tx, stopping) {
                        return;
                    }
                }
            }
            Err(_) => break,
        }
    }

    // Flush the tail, truncated to whole stereo frames.
    let whole = acc.len() / 4 * 4;
    if whole > 0 {
        let tail: Vec<u8> = acc.drain(..whole).collect();
        let _ = emit_audio_chunk(&tail, &mut frames_sent, tx, stopping);
    }
}

fn emit_audio_chunk(
    bytes: &[u8],
    frames_sent: &mut u64,
    tx: &Sender<AudioFrame>,
    stopping: &AtomicBool,
) -> bool {
    let samples = bytes_to_samples(bytes);
    let frame = AudioFrame {
        pts: *frames_sent as f64 / 48_000.0,
        sample_rate: 48_000,
        channels: 2,
        samples,
    };
    *frames_sent += frame.sample_count() as u64;
    send_with_stop(tx, frame, stopping)
}

/// Little-endian byte pairs to i16 samples.
fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
