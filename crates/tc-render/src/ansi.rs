//! Assemblage du flux d'échappement ANSI, une fois par frame.

use std::fmt::Write as _;

use tc_core::color::{unpack_rgb, xterm_index};
use tc_core::config::{RenderMode, RendererConfig};
use tc_core::frame::AsciiCell;

/// Build the full escape stream for a cell grid.
///
/// The stream begins with cursor-home `ESC[H` (no clear, the grid fully
/// covers the region) and every row ends with `ESC[0m\r\n`. TrueColor
/// tracks the last emitted foreground and only re-emits on change;
/// Ansi256 and Gray emit per cell. In half-block mode the background
/// SGR is emitted whenever it differs from the previous cell's.
/// `have_color` starts false so the first cell always emits its color.
#[must_use]
pub fn build_terminal_string(
    cells: &[AsciiCell],
    cols: u16,
    rows: u16,
    cfg: &RendererConfig,
) -> String {
    let cols = usize::from(cols);
    let rows = usize::from(rows);
    let mut buf = String::with_capacity(cells.len() * 12 + 16);
    buf.push_str("\x1b[H");

    for row in 0..rows {
        let mut current_fg = u32::MAX;
        let mut current_bg = 0u32;
        let mut have_color = false;
        for col in 0..cols {
            let cell = &cells[row * cols + col];
            match cfg.mode {
                RenderMode::TrueColor => {
                    if !have_color || cell.fg != current_fg {
                        let (r, g, b) = unpack_rgb(cell.fg);
                        let _ = write!(buf, "\x1b[38;2;{r};{g};{b}m");
                        current_fg = cell.fg;
                        have_color = true;
                    }
                }
                RenderMode::Ansi256 => {
                    let (r, g, b) = unpack_rgb(cell.fg);
                    let _ = write!(buf, "\x1b[38;5;{}m", xterm_index(r, g, b));
                }
                RenderMode::Gray => {
                    let gray = (cell.fg >> 16) & 0xFF;
                    let _ = write!(buf, "\x1b[38;2;{gray};{gray};{gray}m");
                }
            }

            if cfg.half_block && (!have_color || cell.bg != current_bg) {
                let (r, g, b) = unpack_rgb(cell.bg);
                let _ = write!(buf, "\x1b[48;2;{r};{g};{b}m");
                current_bg = cell.bg;
            }

            buf.push(cell.ch);
        }
        buf.push_str("\x1b[0m\r\n");
    }
    buf
}
