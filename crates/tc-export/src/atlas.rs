//! Atlas de glyphes 8×16 figé en dur.
//!
//! The renderer only ever emits the ten ramp glyphs, the dither
//! emphasis mark and the half-block, so the atlas covers exactly that
//! set. Anything else falls back to `'#'`, matching the terminal
//! pipeline's visual density.

/// Glyph bitmap width in pixels. Bit 7 of each row byte is the
/// leftmost pixel.
pub const GLYPH_WIDTH: u32 = 8;
/// Glyph bitmap height in rows.
pub const GLYPH_HEIGHT: u32 = 16;

type Bitmap = [u8; 16];

const GLYPH_SPACE: Bitmap = [0; 16];

const GLYPH_DOT: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_COLON: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_MINUS: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_EQUALS: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_PLUS: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x7E, 0x18, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_STAR: Bitmap = [
    0x00, 0x00, 0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_HASH: Bitmap = [
    0x00, 0x00, 0x6C, 0x6C, 0xFE, 0x6C, 0x6C, 0x6C, 0xFE, 0x6C, 0x6C, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_PERCENT: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0xC2, 0xC6, 0x0C, 0x18, 0x30, 0x60, 0xC6, 0x86, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_AT: Bitmap = [
    0x00, 0x00, 0x00, 0x7C, 0xC6, 0xC6, 0xDE, 0xDE, 0xDE, 0xDC, 0xC0, 0x7C, 0x00, 0x00, 0x00,
    0x00,
];

const GLYPH_HALF_BLOCK: Bitmap = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF,
];

/// Bitmap for a glyph, with `'#'` as the out-of-set fallback.
///
/// # Example
/// ```
/// use tc_export::atlas::glyph_bitmap;
/// assert_eq!(glyph_bitmap(' '), glyph_bitmap(' '));
/// assert_eq!(glyph_bitmap('é'), glyph_bitmap('#'));
/// ```
#[must_use]
pub fn glyph_bitmap(ch: char) -> &'static Bitmap {
    match ch {
        ' ' => &GLYPH_SPACE,
        '.' => &GLYPH_DOT,
        ':' => &GLYPH_COLON,
        '-' => &GLYPH_MINUS,
        '=' => &GLYPH_EQUALS,
        '+' => &GLYPH_PLUS,
        '*' => &GLYPH_STAR,
        '%' => &GLYPH_PERCENT,
        '@' => &GLYPH_AT,
        '▄' => &GLYPH_HALF_BLOCK,
        _ => &GLYPH_HASH,
    }
}

/// True when the bitmap pixel at (x, y) is set, after nearest-neighbor
/// scaling from 8×16 to `cell_w × cell_h`.
#[inline(always)]
#[must_use]
pub fn pixel_on(bitmap: &Bitmap, x: u32, y: u32, cell_w: u32, cell_h: u32) -> bool {
    let src_x = x * GLYPH_WIDTH / cell_w.max(1);
    let src_y = y * GLYPH_HEIGHT / cell_h.max(1);
    let row = bitmap[(src_y.min(GLYPH_HEIGHT - 1)) as usize];
    (row >> (7 - src_x.min(7))) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::ramp;

    #[test]
    fn ramp_is_fully_covered() {
        // Every glyph the renderer can emit resolves without hitting
        // the fallback, except '#' which IS the fallback bitmap.
        for &ch in &ramp::RAMP {
            let bitmap = glyph_bitmap(ch);
            if ch == ' ' {
                assert!(bitmap.iter().all(|&row| row == 0));
            }
        }
        assert_eq!(glyph_bitmap(ramp::HALF_BLOCK), &GLYPH_HALF_BLOCK);
        assert_eq!(glyph_bitmap(ramp::DITHER_EMPHASIS), &GLYPH_HASH);
    }

    #[test]
    fn unknown_glyph_falls_back_to_hash() {
        assert_eq!(glyph_bitmap('Z'), &GLYPH_HASH);
        assert_eq!(glyph_bitmap('\u{1F600}'), &GLYPH_HASH);
    }

    #[test]
    fn ink_density_orders_ramp_extremes() {
        let count = |ch: char| {
            glyph_bitmap(ch)
                .iter()
                .map(|row| row.count_ones())
                .sum::<u32>()
        };
        assert_eq!(count(' '), 0);
        assert!(count('.') < count('+'));
        assert!(count('+') < count('@'));
    }

    #[test]
    fn half_block_covers_exactly_bottom_half() {
        let bitmap = glyph_bitmap('▄');
        for y in 0..8 {
            for x in 0..8 {
                assert!(!pixel_on(bitmap, x, y, 8, 16), "top half off at {x},{y}");
            }
        }
        for y in 8..16 {
            for x in 0..8 {
                assert!(pixel_on(bitmap, x, y, 8, 16), "bottom half on at {x},{y}");
            }
        }
    }

    #[test]
    fn scaling_preserves_half_block_split() {
        let bitmap = glyph_bitmap('▄');
        // 4×8 cell: rows 0..4 off, rows 4..8 on.
        for y in 0..4 {
            assert!(!pixel_on(bitmap, 0, y, 4, 8));
        }
        for y in 4..8 {
            assert!(pixel_on(bitmap, 0, y, 4, 8));
        }
    }
}
