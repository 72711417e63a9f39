//! Le renderer ASCII : échantillonnage des cellules et application du mode.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rayon::prelude::*;

use tc_core::color::{apply_contrast, apply_gamma, pack_rgb, xterm_index, XTERM_PALETTE};
use tc_core::config::{RenderMode, RendererConfig};
use tc_core::dither;
use tc_core::frame::{AsciiCell, AsciiFrame, VideoFrame};
use tc_core::ramp;

use crate::ansi;

/// Convertisseur frame vidéo → frame ASCII.
///
/// The configuration lives behind an `ArcSwap`: the keyboard thread
/// swaps in updated snapshots while [`AsciiRenderer::render`] takes one
/// copy per frame, so a render call is a pure function of
/// `(frame, snapshot)`. Clones share the same configuration.
///
/// # Example
/// ```
/// use tc_core::config::RendererConfig;
/// use tc_core::frame::VideoFrame;
/// use tc_render::AsciiRenderer;
///
/// let renderer = AsciiRenderer::new(RendererConfig::default());
/// let frame = renderer.render(&VideoFrame::black(16, 16, 0.0));
/// assert_eq!(frame.cells.len(), usize::from(frame.cols) * usize::from(frame.rows));
/// ```
#[derive(Clone)]
pub struct AsciiRenderer {
    config: Arc<ArcSwap<RendererConfig>>,
}

impl AsciiRenderer {
    /// Create a renderer with a clamped copy of `config`.
    #[must_use]
    pub fn new(mut config: RendererConfig) -> Self {
        config.clamp_all();
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Copy of the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> RendererConfig {
        **self.config.load()
    }

    /// Replace the configuration wholesale (clamped).
    pub fn configure(&self, mut config: RendererConfig) {
        config.clamp_all();
        self.config.store(Arc::new(config));
    }

    fn update(&self, f: impl Fn(&mut RendererConfig)) {
        self.config.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
    }

    /// Rotate Gray → Ansi256 → TrueColor → Gray.
    pub fn cycle_mode(&self) {
        self.update(RendererConfig::cycle_mode);
    }

    /// Rotate Off → Bayer2 → Bayer4 → Off.
    pub fn cycle_dither(&self) {
        self.update(RendererConfig::cycle_dither);
    }

    /// Nudge gamma, clamped to [0.5, 4.0].
    pub fn adjust_gamma(&self, delta: f32) {
        self.update(|c| c.adjust_gamma(delta));
    }

    /// Nudge contrast, clamped to [0.2, 3.0].
    pub fn adjust_contrast(&self, delta: f32) {
        self.update(|c| c.adjust_contrast(delta));
    }

    /// Set the render mode directly (keyboard keys 1/2/3).
    pub fn set_mode(&self, mode: RenderMode) {
        self.update(|c| c.mode = mode);
    }

    /// Render one video frame into a cell grid plus its ANSI stream.
    ///
    /// Rows are sampled in parallel; the escape stream is assembled
    /// once and cached on the returned frame.
    #[must_use]
    pub fn render(&self, frame: &VideoFrame) -> AsciiFrame {
        let cfg = self.snapshot();
        let cols = u32::from(cfg.grid_cols);
        let rows = u32::from(cfg.grid_rows);
        let vertical_cells = if cfg.half_block { rows * 2 } else { rows };
        let cell_w = (frame.width / cols.max(1)).max(1);
        let cell_h = (frame.height / vertical_cells.max(1)).max(1);

        let mut cells = vec![AsciiCell::default(); (cols * rows) as usize];
        cells
            .par_chunks_mut(cols as usize)
            .enumerate()
            .for_each(|(row, out_row)| {
                for (col, out) in out_row.iter_mut().enumerate() {
                    *out = build_cell(frame, &cfg, row, col, cell_w, cell_h);
                }
            });

        let terminal = ansi::build_terminal_string(&cells, cfg.grid_cols, cfg.grid_rows, &cfg);

        AsciiFrame {
            cols: cfg.grid_cols,
            rows: cfg.grid_rows,
            cells,
            terminal,
            half_block: cfg.half_block,
            pts: frame.pts,
        }
    }
}

/// One grid cell. Half-block cells sample two stacked regions: the top
/// region's color becomes bg, the bottom's becomes fg.
fn build_cell(
    frame: &VideoFrame,
    cfg: &RendererConfig,
    row: usize,
    col: usize,
    cell_w: u32,
    cell_h: u32,
) -> AsciiCell {
    let start_x = col as u32 * cell_w;
    if cfg.half_block {
        let start_y = row as u32 * 2 * cell_h;
        let top = sample_cell(frame, cfg, start_x, start_y, cell_w, cell_h, row, col);
        let bottom = sample_cell(
            frame,
            cfg,
            start_x,
            start_y + cell_h,
            cell_w,
            cell_h,
            row + 1,
            col,
        );
        AsciiCell {
            ch: ramp::HALF_BLOCK,
            fg: bottom.fg,
            bg: top.fg,
        }
    } else {
        let start_y = row as u32 * cell_h;
        sample_cell(frame, cfg, start_x, start_y, cell_w, cell_h, row, col)
    }
}

/// Sample one region and apply the tone pipeline plus the mode's color
/// assignment. Ordre : gamma puis contraste, ensuite la rampe.
#[allow(clippy::too_many_arguments)]
fn sample_cell(
    frame: &VideoFrame,
    cfg: &RendererConfig,
    start_x: u32,
    start_y: u32,
    cell_w: u32,
    cell_h: u32,
    row: usize,
    col: usize,
) -> AsciiCell {
    let (avg_r, avg_g, avg_b, avg_luma) = frame.sample_region(start_x, start_y, cell_w, cell_h);
    let norm = apply_contrast(apply_gamma(avg_luma / 255.0, cfg.gamma), cfg.contrast);
    let mut ch = ramp::ramp_glyph(norm);

    match cfg.mode {
        RenderMode::Gray => {
            let gray = avg_luma as u8;
            AsciiCell {
                ch,
                fg: pack_rgb(gray, gray, gray),
                bg: 0,
            }
        }
        RenderMode::Ansi256 => {
            let idx = xterm_index(avg_r, avg_g, avg_b);
            let (pr, pg, pb) = XTERM_PALETTE[usize::from(idx)];
            let t = dither::threshold(cfg.dither, row, col);
            if norm + t > 1.0 {
                ch = ramp::DITHER_EMPHASIS;
            }
            AsciiCell {
                ch,
                fg: pack_rgb(pr, pg, pb),
                bg: 0,
            }
        }
        RenderMode::TrueColor => AsciiCell {
            ch,
            fg: pack_rgb(avg_r, avg_g, avg_b),
            bg: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::color::unpack_rgb;
    use tc_core::config::DitherMode;

    fn frame_from_pixels(width: u32, height: u32, pixels: &[(u8, u8, u8)]) -> VideoFrame {
        assert_eq!(pixels.len(), (width * height) as usize);
        let mut data = Vec::with_capacity(pixels.len() * 3);
        for &(r, g, b) in pixels {
            data.extend_from_slice(&[r, g, b]);
        }
        VideoFrame {
            width,
            height,
            data,
            pts: 0.0,
        }
    }

    fn config(mode: RenderMode, cols: u16, rows: u16) -> RendererConfig {
        RendererConfig {
            mode,
            dither: DitherMode::Off,
            half_block: false,
            grid_cols: cols,
            grid_rows: rows,
            gamma: 1.0,
            contrast: 1.0,
        }
    }

    #[test]
    fn gray_black_frame_renders_blank_cells() {
        let renderer = AsciiRenderer::new(config(RenderMode::Gray, 2, 2));
        let out = renderer.render(&VideoFrame::black(4, 4, 0.0));

        assert_eq!(out.cells.len(), 4);
        for cell in &out.cells {
            assert_eq!(cell.ch, ' ');
            assert_eq!(cell.fg, 0, "fg is pure black");
            assert_eq!(cell.bg, 0);
        }
        assert!(out.terminal.starts_with("\x1b[H"));
        assert!(!out.terminal.contains("48;2"), "no background SGR");
    }

    #[test]
    fn gray_cells_have_equal_channels() {
        let pixels: Vec<(u8, u8, u8)> = (0..16).map(|i| (i as u8 * 16, 7, 200)).collect();
        let renderer = AsciiRenderer::new(config(RenderMode::Gray, 4, 4));
        let out = renderer.render(&frame_from_pixels(4, 4, &pixels));
        for cell in &out.cells {
            let (r, g, b) = unpack_rgb(cell.fg);
            assert!(r == g && g == b, "gray fg must have equal channels");
        }
    }

    #[test]
    fn truecolor_keeps_per_cell_average() {
        let pixels = [(255, 0, 0), (0, 0, 0), (0, 0, 0), (0, 0, 0)];
        let renderer = AsciiRenderer::new(config(RenderMode::TrueColor, 2, 2));
        let out = renderer.render(&frame_from_pixels(2, 2, &pixels));

        assert_eq!(unpack_rgb(out.cell(0, 0).fg), (255, 0, 0));
        assert_eq!(unpack_rgb(out.cell(0, 1).fg), (0, 0, 0));
        assert_eq!(unpack_rgb(out.cell(1, 0).fg), (0, 0, 0));
        assert_eq!(unpack_rgb(out.cell(1, 1).fg), (0, 0, 0));
    }

    #[test]
    fn half_block_splits_top_and_bottom() {
        // Rows: white, black, gray, gray. Grid 2×2 over a 2×4 frame.
        let mut pixels = Vec::new();
        pixels.extend_from_slice(&[(255, 255, 255), (255, 255, 255)]);
        pixels.extend_from_slice(&[(0, 0, 0), (0, 0, 0)]);
        pixels.extend_from_slice(&[(128, 128, 128), (128, 128, 128)]);
        pixels.extend_from_slice(&[(128, 128, 128), (128, 128, 128)]);

        let mut cfg = config(RenderMode::TrueColor, 2, 2);
        cfg.half_block = true;
        let renderer = AsciiRenderer::new(cfg);
        let out = renderer.render(&frame_from_pixels(2, 4, &pixels));

        for col in 0..2 {
            let top_cell = out.cell(0, col);
            assert_eq!(top_cell.ch, '▄');
            assert_eq!(unpack_rgb(top_cell.bg), (255, 255, 255), "top region is bg");
            assert_eq!(unpack_rgb(top_cell.fg), (0, 0, 0), "bottom region is fg");

            let bottom_cell = out.cell(1, col);
            assert_eq!(unpack_rgb(bottom_cell.bg), (128, 128, 128));
            assert_eq!(unpack_rgb(bottom_cell.fg), (128, 128, 128));
        }
        assert!(out.terminal.contains("\x1b[48;2;255;255;255m"));
    }

    #[test]
    fn bayer4_emphasis_marks_mid_gray() {
        let pixels = vec![(128, 128, 128); 16];
        let mut cfg = config(RenderMode::Ansi256, 4, 4);
        cfg.dither = DitherMode::Bayer4;
        let renderer = AsciiRenderer::new(cfg);
        let out = renderer.render(&frame_from_pixels(4, 4, &pixels));

        // norm ≈ 0.502, so every threshold ≥ 8/16 pushes past 1.0.
        let marked = out.cells.iter().filter(|c| c.ch == '#').count();
        assert!(marked >= 1, "at least one emphasised cell");
        assert_eq!(out.cell(0, 1).ch, '#', "threshold 8/16 cell is marked");
        assert_ne!(out.cell(0, 0).ch, '#', "threshold 0 cell is not");
    }

    #[test]
    fn single_cell_grid_matches_image_mean() {
        let pixels: Vec<(u8, u8, u8)> = (0..16u32)
            .map(|i| {
                let v = (i * 16) as u8;
                (v, v, v)
            })
            .collect();
        let frame = frame_from_pixels(4, 4, &pixels);
        let mean = frame.mean_luminance();

        let renderer = AsciiRenderer::new(config(RenderMode::Gray, 1, 1));
        let out = renderer.render(&frame);
        let (g, _, _) = unpack_rgb(out.cell(0, 0).fg);
        assert!(
            (f32::from(g) - mean).abs() <= 1.0,
            "cell luminance {g} vs image mean {mean}"
        );
    }

    #[test]
    fn mutators_are_shared_between_clones() {
        let renderer = AsciiRenderer::new(config(RenderMode::Gray, 8, 8));
        let other = renderer.clone();
        other.cycle_mode();
        assert_eq!(renderer.snapshot().mode, RenderMode::Ansi256);
        other.adjust_gamma(0.1);
        assert!((renderer.snapshot().gamma - 1.1).abs() < 1e-6);
    }

    #[test]
    fn pts_is_carried_through() {
        let renderer = AsciiRenderer::new(config(RenderMode::Gray, 2, 2));
        let out = renderer.render(&VideoFrame::black(4, 4, 1.25));
        assert!((out.pts - 1.25).abs() < f64::EPSILON);
    }
}
