/// Sortie terminal : raw mode, curseur, overlay de stats.
///
/// The sink writes the prebuilt ANSI stream of each
/// [`tc_core::AsciiFrame`] to stdout and restores the terminal on
/// teardown, including on drop.

pub mod sink;
pub mod throttle;

pub use sink::TerminalSink;
pub use throttle::WriteThrottle;
