//! Surface ligne de commande.

use std::path::PathBuf;

use clap::Parser;

use tc_core::config::{DitherMode, RenderMode, RendererConfig};
use tc_export::ExportConfig;

/// termcine, a terminal character-art video player and exporter.
#[derive(Parser, Debug)]
#[command(name = "termcine", version, about, long_about = None)]
pub struct Cli {
    /// Input media file or URL.
    pub input: String,

    /// Render mode: gray, 256, truecolor.
    #[arg(long, default_value = "256", value_parser = parse_mode)]
    pub mode: RenderMode,

    /// Character grid as <cols>x<rows>.
    #[arg(long, value_parser = parse_dimension)]
    pub grid: Option<(u16, u16)>,

    /// Half-block vertical doubling: on or off.
    #[arg(long, default_value = "off", value_parser = parse_switch, action = clap::ArgAction::Set)]
    pub halfblock: bool,

    /// Present at a fixed rate instead of following stream PTS.
    #[arg(long)]
    pub fps: Option<f64>,

    /// Disable audio decoding and playback.
    #[arg(long, default_value_t = false)]
    pub no_audio: bool,

    /// Volume percentage, 0..=200.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u16).range(0..=200))]
    pub volume: u16,

    /// Export to a video file instead of playing in the terminal.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export grid as <cols>x<rows>. Defaults to --grid.
    #[arg(long, value_parser = parse_dimension)]
    pub export_grid: Option<(u16, u16)>,

    /// Export glyph cell size as <w>x<h> pixels.
    #[arg(long, default_value = "8x16", value_parser = parse_dimension)]
    pub export_font: (u16, u16),

    /// x264 constant rate factor, 0..=51.
    #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u8).range(0..=51))]
    pub export_crf: u8,

    /// Export frame rate. Defaults to --fps, then 30.
    #[arg(long)]
    pub export_fps: Option<f64>,

    /// Dither mode: off, bayer2, bayer4.
    #[arg(long, default_value = "bayer4", value_parser = parse_dither)]
    pub dither: DitherMode,

    /// Gamma, clamped to [0.5, 4.0].
    #[arg(long, default_value_t = 2.2)]
    pub gamma: f32,

    /// Contrast, clamped to [0.2, 3.0].
    #[arg(long, default_value_t = 1.0)]
    pub contrast: f32,

    /// Terminal write budget in MB/s. 0 disables the throttle.
    #[arg(long, default_value_t = 100.0)]
    pub maxwrite: f64,

    /// Show the status line overlay.
    #[arg(long, default_value_t = false)]
    pub stats: bool,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

fn parse_mode(value: &str) -> Result<RenderMode, String> {
    match value {
        "gray" => Ok(RenderMode::Gray),
        "256" => Ok(RenderMode::Ansi256),
        "truecolor" => Ok(RenderMode::TrueColor),
        other => Err(format!("unknown mode '{other}' (gray, 256, truecolor)")),
    }
}

fn parse_dither(value: &str) -> Result<DitherMode, String> {
    match value {
        "off" => Ok(DitherMode::Off),
        "bayer2" => Ok(DitherMode::Bayer2),
        "bayer4" => Ok(DitherMode::Bayer4),
        other => Err(format!("unknown dither '{other}' (off, bayer2, bayer4)")),
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("expected 'on' or 'off', got '{other}'")),
    }
}

/// Parse `<w>x<h>` with both parts positive.
fn parse_dimension(value: &str) -> Result<(u16, u16), String> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| format!("expected <w>x<h>, got '{value}'"))?;
    let w: u16 = w
        .parse()
        .map_err(|_| format!("invalid width in '{value}'"))?;
    let h: u16 = h
        .parse()
        .map_err(|_| format!("invalid height in '{value}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("dimensions must be positive, got '{value}'"));
    }
    Ok((w, h))
}

impl Cli {
    fn grid_or_default(&self) -> (u16, u16) {
        let defaults = RendererConfig::default();
        self.grid.unwrap_or((defaults.grid_cols, defaults.grid_rows))
    }

    /// Renderer configuration resolved from the flags. In export mode
    /// the renderer adopts the export grid so the rasterizer sees
    /// matching frames.
    #[must_use]
    pub fn renderer_config(&self) -> RendererConfig {
        let (grid_cols, grid_rows) = if self.export.is_some() {
            self.export_grid.unwrap_or_else(|| self.grid_or_default())
        } else {
            self.grid_or_default()
        };
        let mut config = RendererConfig {
            mode: self.mode,
            dither: self.dither,
            half_block: self.halfblock,
            grid_cols,
            grid_rows,
            gamma: self.gamma,
            contrast: self.contrast,
        };
        config.clamp_all();
        config
    }

    /// Export configuration, when `--export` was given.
    #[must_use]
    pub fn export_config(&self) -> Option<ExportConfig> {
        let output = self.export.clone()?;
        let (grid_cols, grid_rows) = self.export_grid.unwrap_or_else(|| self.grid_or_default());
        Some(ExportConfig {
            output,
            grid_cols,
            grid_rows,
            font_w: u32::from(self.export_font.0),
            font_h: u32::from(self.export_font.1),
            crf: self.export_crf,
            fps: self.export_fps.or(self.fps).unwrap_or(30.0),
        })
    }
}
