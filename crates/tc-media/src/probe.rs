//! Interrogation des flux via ffprobe.

use std::process::Command;

use anyhow::{bail, Context, Result};

use tc_core::CoreError;

/// Stream geometry and timing discovered at open time.
#[derive(Clone, Copy, Debug)]
pub struct StreamInfo {
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Average video frame rate in frames per second.
    pub fps: f64,
    /// Whether the input carries at least one audio stream.
    pub has_audio: bool,
}

/// Probe `url` for its best video stream and audio presence.
///
/// # Errors
/// Returns an error if ffprobe is missing, exits non-zero, or reports
/// no usable video stream.
pub fn probe(url: &str) -> Result<StreamInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate",
            "-of",
            "default=noprint_wrappers=1",
            url,
        ])
        .output()
        .context("failed to run ffprobe (is it on PATH?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffprobe failed for {url}: {}", stderr.trim());
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let (width, height, fps) = parse_video_entries(&text).ok_or_else(|| {
        CoreError::UnsupportedFormat {
            format: format!("no usable video stream in {url}"),
        }
    })?;

    let has_audio = probe_has_audio(url);

    log::info!("probed {url}: {width}x{height} @ {fps:.3} fps, audio={has_audio}");
    Ok(StreamInfo {
        width,
        height,
        fps,
        has_audio,
    })
}

/// True when the input exposes an audio stream. Failures count as "no
/// audio" so a missing track degrades instead of aborting.
fn probe_has_audio(url: &str) -> bool {
    Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "a:0",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "default=noprint_wrappers=1",
            url,
        ])
        .output()
        .map(|out| {
            out.status.success()
                && String::from_utf8_lossy(&out.stdout).contains("codec_type=audio")
        })
        .unwrap_or(false)
}

/// Parse `key=value` lines from ffprobe's default writer.
fn parse_video_entries(text: &str) -> Option<(u32, u32, f64)> {
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "width" => width = value.trim().parse::<u32>().ok(),
            "height" => height = value.trim().parse::<u32>().ok(),
            "avg_frame_rate" => fps = parse_rate(value.trim()),
            _ => {}
        }
    }
    let width = width.filter(|&w| w > 0)?;
    let height = height.filter(|&h| h > 0)?;
    // Streams with unknown timing fall back to 30 fps pacing.
    Some((width, height, fps.unwrap_or(30.0)))
}

/// Parse an ffprobe rational like `30000/1001` or a bare number.
fn parse_rate(value: &str) -> Option<f64> {
    if let Some((num, den)) = value.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if num <= 0.0 || den <= 0.0 {
            return None;
        }
        return Some(num / den);
    }
    let rate: f64 = value.parse().ok()?;
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_parses_rationals() {
        assert!((parse_rate("25/1").unwrap() - 25.0).abs() < 1e-9);
        let ntsc = parse_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert!((parse_rate("23.976").unwrap() - 23.976).abs() < 1e-9);
    }

    #[test]
    fn rate_rejects_degenerate_values() {
        assert!(parse_rate("0/0").is_none());
        assert!(parse_rate("25/0").is_none());
        assert!(parse_rate("-1").is_none());
        assert!(parse_rate("garbage").is_none());
    }

    #[test]
    fn video_entries_parse() {
        let text = "width=1920\nheight=1080\navg_frame_rate=24000/1001\n";
        let (w, h, fps) = parse_video_entries(text).unwrap();
        assert_eq!((w, h), (1920, 1080));
        assert!((fps - 23.976).abs() < 0.01);
    }

    #[test]
    fn video_entries_default_fps_when_unknown() {
        let text = "width=640\nheight=360\navg_frame_rate=0/0\n";
        let (_, _, fps) = parse_video_entries(text).unwrap();
        assert!((fps - 30.0).abs() < 1e-9);
    }

    #[test]
    fn video_entries_reject_missing_geometry() {
        assert!(parse_video_entries("avg_frame_rate=25/1\n").is_none());
        assert!(parse_video_entries("width=0\nheight=100\n").is_none());
    }
}
