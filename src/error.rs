//! Error types for the synoptic application.
//!
//! User-input errors (`InvalidRegion`, `InvalidTime`, `InvalidParameter`) block a
//! render. `DataUnavailable` and `Render` errors are scoped to one field or one
//! panel and the gallery degrades around them.

use thiserror::Error;

/// The main error type for synoptic operations.
#[derive(Error, Debug)]
pub enum SynopticError {
    /// Region text or preset could not be turned into a valid bounding box
    #[error("Invalid region: {message}")]
    InvalidRegion { message: String },

    /// Initialization time is malformed or outside the provider's range
    #[error("Invalid time: {message}")]
    InvalidTime { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// A field could not be fetched or selected from its source
    #[error("Data unavailable for {variable} at {level}: {reason}")]
    DataUnavailable {
        variable: String,
        level: String,
        reason: String,
    },

    /// The raster backend failed for one panel
    #[error("Render error for panel {panel}: {message}")]
    Render { panel: String, message: String },

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Image encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl SynopticError {
    /// Shorthand for a `DataUnavailable` error
    pub fn unavailable(
        variable: impl Into<String>,
        level: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SynopticError::DataUnavailable {
            variable: variable.into(),
            level: level.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from user input and should be re-prompted
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SynopticError::InvalidRegion { .. }
                | SynopticError::InvalidTime { .. }
                | SynopticError::InvalidParameter { .. }
        )
    }
}

/// Convenience type alias for Results with SynopticError
pub type Result<T> = std::result::Result<T, SynopticError>;
