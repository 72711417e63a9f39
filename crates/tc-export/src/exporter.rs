//! Rasterisation de la grille et écriture à cadence fixe.

use std::path::PathBuf;

use anyhow::{bail, Result};
use rayon::prelude::*;

use tc_core::color::unpack_rgb;
use tc_core::frame::AsciiFrame;
use tc_core::CoreError;

use crate::atlas;
use crate::encoder::VideoEncoder;

/// Export parameters resolved from the CLI.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Output file path (container inferred by ffmpeg).
    pub output: PathBuf,
    /// Grid width in cells.
    pub grid_cols: u16,
    /// Grid height in cells.
    pub grid_rows: u16,
    /// Rendered glyph cell width in pixels, minimum 4.
    pub font_w: u32,
    /// Rendered glyph cell height in pixels, minimum 8.
    pub font_h: u32,
    /// x264 constant rate factor, 0..=51.
    pub crf: u8,
    /// Output frame rate.
    pub fps: f64,
}

/// Consomme des `AsciiFrame` et produit un fichier vidéo encodé.
pub struct Exporter {
    encoder: VideoEncoder,
    cols: u16,
    rows: u16,
    cell_w: u32,
    cell_h: u32,
    width_px: u32,
    /// Reused RGB24 scratch buffer, one frame large.
    rgb: Vec<u8>,
}

impl Exporter {
    /// Validate the configuration and spawn the encoder.
    ///
    /// # Errors
    /// Returns an error on an empty output path, an out-of-range CRF,
    /// or an encoder spawn failure.
    pub fn open(cfg: &ExportConfig) -> Result<Self> {
        if cfg.output.as_os_str().is_empty() {
            return Err(CoreError::Config("empty export filename".into()).into());
        }
        if cfg.grid_cols == 0 || cfg.grid_rows == 0 {
            return Err(CoreError::InvalidDimensions {
                width: u32::from(cfg.grid_cols),
                height: u32::from(cfg.grid_rows),
            }
            .into());
        }
        if cfg.crf > 51 {
            return Err(CoreError::Config(format!("crf {} out of range 0..=51", cfg.crf)).into());
        }
        if cfg.fps <= 0.0 {
            return Err(CoreError::Config("export fps must be positive".into()).into());
        }

        let cell_w = cfg.font_w.max(4);
        let cell_h = cfg.font_h.max(8);
        let width_px = u32::from(cfg.grid_cols) * cell_w;
        let height_px = u32::from(cfg.grid_rows) * cell_h;

        let encoder = VideoEncoder::new(&cfg.output, width_px, height_px, cfg.fps, cfg.crf)?;
        log::info!(
            "exporting {}x{} cells as {width_px}x{height_px} px to {}",
            cfg.grid_cols,
            cfg.grid_rows,
            cfg.output.display()
        );

        Ok(Self {
            encoder,
            cols: cfg.grid_cols,
            rows: cfg.grid_rows,
            cell_w,
            cell_h,
            width_px,
            rgb: vec![0u8; (width_px * height_px * 3) as usize],
        })
    }

    /// Rasterize one frame through the atlas and pipe it out.
    ///
    /// # Errors
    /// Returns an error on grid dimension mismatch or a pipe failure.
    /// Callers log and keep going; one bad frame does not end a run.
    pub fn write_frame(&mut self, frame: &AsciiFrame) -> Result<()> {
        if frame.cols != self.cols || frame.rows != self.rows {
            bail!(
                "frame grid {}x{} does not match export grid {}x{}",
                frame.cols,
                frame.rows,
                self.cols,
                self.rows
            );
        }
        rasterize(
            frame,
            self.cell_w,
            self.cell_h,
            self.width_px,
            &mut self.rgb,
        );
        self.encoder.write_frame(&self.rgb)
    }

    /// Finalize the container.
    ///
    /// # Errors
    /// Returns an error if the encoder reports a failure on close.
    pub fn close(self) -> Result<()> {
        self.encoder.finish()
    }
}

/// Blit every cell into the RGB24 buffer, one cell band of rows per
/// rayon task. Foreground where the atlas bit is set, background
/// elsewhere.
fn rasterize(frame: &AsciiFrame, cell_w: u32, cell_h: u32, width_px: u32, out: &mut [u8]) {
    let band_len = (width_px * 3 * cell_h) as usize;
    out.par_chunks_mut(band_len)
        .enumerate()
        .for_each(|(row, band)| {
            for col in 0..usize::from(frame.cols) {
                let cell = frame.cell(row as u16, col as u16);
                let bitmap = atlas::glyph_bitmap(cell.ch);
                let fg = unpack_rgb(cell.fg);
                let bg = unpack_rgb(cell.bg);
                let base_x = col as u32 * cell_w;

                for yy in 0..cell_h {
                    let line = (yy * width_px * 3) as usize;
                    for xx in 0..cell_w {
                        let (r, g, b) = if atlas::pixel_on(bitmap, xx, yy, cell_w, cell_h) {
                            fg
                        } else {
                            bg
                        };
                        let px = line + ((base_x + xx) * 3) as usize;
                        band[px] = r;
                        band[px + 1] = g;
                        band[px + 2] = b;
                    }
                }
            }
        });
}
