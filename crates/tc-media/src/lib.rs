/// Décodage média via ffmpeg, en sous-processus.
///
/// The decoder demuxes and decodes through ffmpeg child processes:
/// video arrives as raw RGB24 frames, audio as interleaved s16 stereo
/// at 48 kHz, both PTS-stamped and pushed through bounded channels so
/// decoding pauses when the pipeline falls behind.

pub mod decoder;
pub mod probe;

pub use decoder::{DecoderOptions, MediaDecoder};
pub use probe::StreamInfo;
