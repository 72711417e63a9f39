/// Sortie audio cpal et horloge de lecture maître.
///
/// The sink consumes interleaved s16 stereo frames and exposes a
/// monotonic playback clock derived from the samples actually committed
/// to the device. The clock is the single source of truth for A/V sync.

pub mod sink;

pub use sink::{start, AudioOutput, AudioSink};
