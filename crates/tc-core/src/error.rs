use thiserror::Error;

/// Structured init-time failures shared across the workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid width/height dimensions.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },

    /// Unsupported file or data format.
    #[error("unsupported format: {format}")]
    UnsupportedFormat {
        /// The format string that is unsupported.
        format: String,
    },
}
