//! Écriture des frames ANSI sur stdout, restauration à la sortie.

use std::io::{self, Write};
use std::thread;

use anyhow::Result;
use crossterm::{cursor, execute, terminal};

use tc_core::frame::AsciiFrame;

use crate::throttle::WriteThrottle;

/// Terminal sink: raw mode in, frames out.
///
/// `initialize` and `teardown` are idempotent; drop restores the
/// terminal even on abnormal exit paths.
pub struct TerminalSink {
    initialized: bool,
    throttle: WriteThrottle,
}

impl TerminalSink {
    /// Sink with a write budget in MB/s (0 disables throttling).
    #[must_use]
    pub fn new(max_write_mbps: f64) -> Self {
        Self {
            initialized: false,
            throttle: WriteThrottle::new(max_write_mbps),
        }
    }

    /// Enter raw mode, hide the cursor, and clear the screen once.
    ///
    /// The per-frame stream only homes the cursor (`ESC[H`); clearing
    /// here keeps remnants of the shell prompt out of the first frame.
    ///
    /// # Errors
    /// Returns an error when stdout is not a terminal.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        terminal::enable_raw_mode()?;
        execute!(
            io::stdout(),
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All)
        )?;
        self.initialized = true;
        Ok(())
    }

    /// Write one prebuilt frame and flush.
    ///
    /// # Errors
    /// Propagates stdout write failures.
    pub fn present(&mut self, frame: &AsciiFrame) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let bytes = frame.terminal.as_bytes();
        {
            let mut out = io::stdout().lock();
            out.write_all(bytes)?;
            out.flush()?;
        }
        if let Some(delay) = self.throttle.record(bytes.len()) {
            thread::sleep(delay);
        }
        Ok(())
    }

    /// One-line status at the top of the screen, cursor position saved
    /// and restored around it.
    ///
    /// # Errors
    /// Propagates stdout write failures.
    pub fn print_stats(&mut self, line: &str) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mut out = io::stdout().lock();
        write!(out, "\x1b[s\x1b[H{line}\x1b[u")?;
        out.flush()
    }

    /// Restore the terminal: show cursor, leave raw mode, reset SGR.
    /// Idempotent.
    pub fn teardown(&mut self) {
        if !self.initialized {
            return;
        }
        let _ = execute!(io::stdout(), cursor::Show);
        let _ = terminal::disable_raw_mode();
        let mut out = io::stdout();
        let _ = out.write_all(b"\x1b[0m");
        let _ = out.flush();
        self.initialized = false;
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_before_initialize_is_a_noop() {
        let mut sink = TerminalSink::new(100.0);
        let frame = AsciiFrame::default();
        assert!(sink.present(&frame).is_ok());
        assert!(sink.print_stats("FPS: 0.0").is_ok());
    }

    #[test]
    fn teardown_without_initialize_is_safe() {
        let mut sink = TerminalSink::new(100.0);
        sink.teardown();
        sink.teardown();
    }

    #[test]
    fn initialize_is_idempotent_when_tty_present() {
        // Raw mode needs a real TTY; skip quietly under CI.
        let mut sink = TerminalSink::new(100.0);
        match sink.initialize() {
            Ok(()) => {
                assert!(sink.initialize().is_ok());
                sink.teardown();
            }
            Err(e) => {
                eprintln!("skipping (no TTY): {e}");
            }
        }
    }
}
