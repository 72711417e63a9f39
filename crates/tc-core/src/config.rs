//! Configuration du rendu, mutée à chaud par le thread clavier.

/// Gamma bounds enforced by [`RendererConfig::clamp_all`] and the
/// interactive adjusters.
pub const GAMMA_MIN: f32 = 0.5;
pub const GAMMA_MAX: f32 = 4.0;

/// Contrast bounds.
pub const CONTRAST_MIN: f32 = 0.2;
pub const CONTRAST_MAX: f32 = 3.0;

/// Render mode enumeration.
///
/// # Example
/// ```
/// use tc_core::config::RenderMode;
/// assert_eq!(RenderMode::default(), RenderMode::Gray);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Grayscale truecolor foreground.
    #[default]
    Gray,
    /// Indexed xterm-256 foreground.
    Ansi256,
    /// 24-bit truecolor foreground.
    TrueColor,
}

/// Ordered-dither mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DitherMode {
    /// No dithering.
    #[default]
    Off,
    /// Bayer 2×2.
    Bayer2,
    /// Bayer 4×4.
    Bayer4,
}

/// Configuration du renderer ASCII.
///
/// Créée au démarrage depuis la CLI, mutée par le thread clavier via un
/// `ArcSwap`, copiée une fois par frame par le worker de rendu.
///
/// # Example
/// ```
/// use tc_core::config::RendererConfig;
/// let config = RendererConfig::default();
/// assert_eq!(config.grid_cols, 120);
/// assert_eq!(config.grid_rows, 60);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    /// Current render mode.
    pub mode: RenderMode,
    /// Ordered-dither mode.
    pub dither: DitherMode,
    /// Half-block vertical doubling (▄ with distinct fg/bg).
    pub half_block: bool,
    /// Grid width in character cells.
    pub grid_cols: u16,
    /// Grid height in character cells.
    pub grid_rows: u16,
    /// Gamma in [0.5, 4.0].
    pub gamma: f32,
    /// Contrast in [0.2, 3.0].
    pub contrast: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Gray,
            dither: DitherMode::Bayer4,
            half_block: false,
            grid_cols: 120,
            grid_rows: 60,
            gamma: 2.2,
            contrast: 1.0,
        }
    }
}

impl RendererConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after parsing any external input.
    pub fn clamp_all(&mut self) {
        self.gamma = self.gamma.clamp(GAMMA_MIN, GAMMA_MAX);
        self.contrast = self.contrast.clamp(CONTRAST_MIN, CONTRAST_MAX);
        self.grid_cols = self.grid_cols.max(1);
        self.grid_rows = self.grid_rows.max(1);
    }

    /// Rotate Gray → Ansi256 → TrueColor → Gray.
    ///
    /// # Example
    /// ```
    /// use tc_core::config::RendererConfig;
    /// let mut config = RendererConfig::default();
    /// let before = config;
    /// config.cycle_mode();
    /// config.cycle_mode();
    /// config.cycle_mode();
    /// assert_eq!(config, before);
    /// ```
    pub fn cycle_mode(&mut self) {
        self.mode = match self.mode {
            RenderMode::Gray => RenderMode::Ansi256,
            RenderMode::Ansi256 => RenderMode::TrueColor,
            RenderMode::TrueColor => RenderMode::Gray,
        };
    }

    /// Rotate Off → Bayer2 → Bayer4 → Off.
    pub fn cycle_dither(&mut self) {
        self.dither = match self.dither {
            DitherMode::Off => DitherMode::Bayer2,
            DitherMode::Bayer2 => DitherMode::Bayer4,
            DitherMode::Bayer4 => DitherMode::Off,
        };
    }

    /// Nudge gamma by `delta`, clamped to [0.5, 4.0].
    pub fn adjust_gamma(&mut self, delta: f32) {
        self.gamma = (self.gamma + delta).clamp(GAMMA_MIN, GAMMA_MAX);
    }

    /// Nudge contrast by `delta`, clamped to [0.2, 3.0].
    pub fn adjust_contrast(&mut self, delta: f32) {
        self.contrast = (self.contrast + delta).clamp(CONTRAST_MIN, CONTRAST_MAX);
    }
}
