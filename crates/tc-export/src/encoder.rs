//! Encodage H.264 via un process ffmpeg enfant.

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use anyhow::{bail, Context, Result};

/// Encode raw RGB24 frames into an H.264 file through ffmpeg's stdin.
pub struct VideoEncoder {
    child: Child,
}

impl VideoEncoder {
    /// Spawn the encoder for `width × height` frames at `fps`.
    ///
    /// yuv420p needs even dimensions, so odd grids are padded by one
    /// pixel on the right/bottom edge.
    ///
    /// # Errors
    /// Returns an error if ffmpeg is not installed or cannot start.
    pub fn new(output: &Path, width: u32, height: u32, fps: f64, crf: u8) -> Result<Self> {
        let path_str = output.to_str().context("export path is not valid UTF-8")?;

        let child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-vcodec",
                "rawvideo",
                "-s",
                &format!("{width}x{height}"),
                "-pix_fmt",
                "rgb24",
                "-r",
                &format!("{fps}"),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-crf",
                &crf.to_string(),
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-pix_fmt",
                "yuv420p",
                "-hide_banner",
                "-loglevel",
                "error",
                path_str,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to start the ffmpeg encoder (is it on PATH?)")?;

        Ok(Self { child })
    }

    /// Pipe one raw RGB24 frame to the encoder.
    ///
    /// # Errors
    /// Returns an I/O error if the pipe write fails.
    pub fn write_frame(&mut self, rgb: &[u8]) -> Result<()> {
        if let Some(stdin) = self.child.stdin.as_mut() {
            stdin.write_all(rgb)?;
        }
        Ok(())
    }

    /// Close the stream and finalize the container.
    ///
    /// # Errors
    /// Returns an error if ffmpeg reports a failure on exit.
    pub fn finish(mut self) -> Result<()> {
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg encoder error: {}", stderr.trim());
        }
        Ok(())
    }
}
