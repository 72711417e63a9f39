//! Matrices de Bayer pour le tramage ordonné (ordered dithering).

use crate::config::DitherMode;

/// Matrice de Bayer 2×2. Normalisée sur 4 niveaux (0-3).
pub const BAYER_2X2: [[u8; 2]; 2] = [[0, 2], [3, 1]];

/// Matrice de Bayer 4×4. Normalisée sur 16 niveaux (0-15).
pub const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Dither threshold for a cell position, in [0, 1).
///
/// `Off` behaves as a 1×1 zero matrix. `Bayer2` and `Bayer4` tile their
/// matrix over the grid and scale to fractions of one quantization step.
///
/// # Example
/// ```
/// use tc_core::config::DitherMode;
/// use tc_core::dither::threshold;
/// assert!(threshold(DitherMode::Off, 7, 3).abs() < f32::EPSILON);
/// assert!((threshold(DitherMode::Bayer2, 1, 0) - 0.75).abs() < f32::EPSILON);
/// assert!((threshold(DitherMode::Bayer4, 3, 0) - 15.0 / 16.0).abs() < f32::EPSILON);
/// ```
#[inline(always)]
#[must_use]
pub fn threshold(mode: DitherMode, row: usize, col: usize) -> f32 {
    match mode {
        DitherMode::Off => 0.0,
        DitherMode::Bayer2 => f32::from(BAYER_2X2[row % 2][col % 2]) / 4.0,
        DitherMode::Bayer4 => f32::from(BAYER_4X4[row % 4][col % 4]) / 16.0,
    }
}
