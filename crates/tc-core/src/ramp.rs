//! Rampe de luminance fixe, du plus dense au plus clair.

/// The ten ramp glyphs, densest first, blank last.
pub const RAMP: [char; 10] = ['@', '%', '#', '*', '+', '=', '-', ':', '.', ' '];

/// Glyph substituted when ordered dithering pushes a cell over 1.0.
pub const DITHER_EMPHASIS: char = '#';

/// Glyph used for half-block cells (U+2584 LOWER HALF BLOCK).
pub const HALF_BLOCK: char = '▄';

/// Map a normalized luminance to a ramp glyph.
///
/// Bright cells get dense glyphs and dark cells fade to blank, so the
/// picture reads correctly on a dark terminal background. A black cell
/// maps to `' '` and a white cell maps to `'@'`.
///
/// # Example
/// ```
/// use tc_core::ramp::ramp_glyph;
/// assert_eq!(ramp_glyph(0.0), ' ');
/// assert_eq!(ramp_glyph(1.0), '@');
/// ```
#[inline(always)]
#[must_use]
pub fn ramp_glyph(norm: f32) -> char {
    let idx = (norm * (RAMP.len() - 1) as f32).round().clamp(0.0, 9.0) as usize;
    RAMP[RAMP.len() - 1 - idx]
}
