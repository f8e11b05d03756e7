//! Custom error types for `sarstac` operations.
//!
//! This module provides structured error handling using `thiserror`. Item-level
//! errors ([`ItemError`]) are caught at the per-item boundary of a provider run
//! and never abort a batch; the remaining variants surface to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for `sarstac` operations.
///
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum SarStacError {
    /// Provider lookup errors
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A single item could not be normalized
    #[error(transparent)]
    Item(#[from] ItemError),

    /// I/O errors (file read/write, path issues, permissions)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Provider registry errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider was not found in the registry
    #[error("Provider '{name}' not found. Available providers: {available}")]
    NotFound {
        /// The requested provider name
        name: String,
        /// Comma-separated list of available providers
        available: String,
    },
}

/// Errors raised while normalizing one STAC item.
///
/// These never abort a provider run: the offending item is logged and dropped.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The document is not a JSON object
    #[error("Item document is not an object (found {found})")]
    NotAnObject {
        /// JSON kind of the document
        found: &'static str,
    },

    /// The item has no geometry
    #[error("Item {} has no geometry", item.as_deref().unwrap_or("<no id>"))]
    MissingGeometry {
        /// Item identifier, when known
        item: Option<String>,
    },

    /// The geometry member is not valid `GeoJSON`
    #[error("Invalid geometry{}: {message}", item.as_ref().map(|id| format!(" in item {id}")).unwrap_or_default())]
    InvalidGeometry {
        /// Item identifier, when known
        item: Option<String>,
        /// Description of the geometry problem
        message: String,
    },

    /// The geometry holds no positions to derive a bounding box from
    #[error("Geometry has no coordinates to compute bounds from")]
    EmptyGeometry,

    /// The properties member is not an object
    #[error("Properties{} must be an object (found {found})", item.as_ref().map(|id| format!(" of item {id}")).unwrap_or_default())]
    InvalidProperties {
        /// Item identifier, when known
        item: Option<String>,
        /// JSON kind found instead
        found: &'static str,
    },

    /// A datetime property could not be parsed
    #[error("Cannot parse '{field}' value {value} as a datetime")]
    InvalidDatetime {
        /// Property name
        field: String,
        /// The offending value, as JSON text
        value: String,
    },
}

/// I/O related errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file or directory
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// The path being read
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file or directory
    #[error("Failed to write '{path}': {source}")]
    Write {
        /// The path being written
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Directory was not found
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound {
        /// The missing path
        path: PathBuf,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option: {option}")]
    MissingRequired {
        /// The missing option name
        option: String,
    },
}

/// Type alias for Results using `SarStacError`.
pub type Result<T> = std::result::Result<T, SarStacError>;

impl SarStacError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(e) => e.user_message(),
            Self::Item(e) => format!("Item error: {e}"),
            Self::Io(e) => e.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Provider(_) => {
                Some("Run 'sarstac providers' to see all available providers.".to_string())
            },
            Self::Io(e) => e.recovery_suggestion(),
            _ => None,
        }
    }

    /// Check if this error is potentially recoverable.
    ///
    /// Recoverable errors might be fixed by retrying with different
    /// parameters or after the user takes some action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Provider(_))
    }
}

impl ProviderError {
    fn user_message(&self) -> String {
        match self {
            Self::NotFound { name, available } => {
                format!(
                    "Provider '{name}' not found.\n\nAvailable providers:\n{}",
                    available
                        .split(", ")
                        .map(|p| format!("  - {p}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            },
        }
    }
}

impl IoError {
    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::DirectoryNotFound { .. } => {
                Some("Check that the input directory exists and has one folder per provider.".to_string())
            },
            Self::Write { .. } => {
                Some("Check that the output directory is writable.".to_string())
            },
            Self::Read { .. } => None,
        }
    }
}

/// Extension trait for adding I/O context to errors.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            SarStacError::Io(IoError::Read {
                path: path.into(),
                source: Box::new(e),
            })
        })
    }

    fn with_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            SarStacError::Io(IoError::Write {
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

/// Helper to create `ProviderError::NotFound` with the available providers.
#[must_use]
pub fn provider_not_found(name: &str) -> ProviderError {
    use crate::providers::get_provider_names;

    ProviderError::NotFound {
        name: name.to_string(),
        available: get_provider_names().join(", "),
    }
}
