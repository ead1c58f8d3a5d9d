//! Error types for the downloader
//!
//! This module defines the error taxonomy shared by the manifest, selection,
//! catalog and transfer components.

use std::fmt;

/// Why a catalog request did not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// The work does not exist upstream
    NotFound,
    /// The service could not be reached or answered with a failure
    Unavailable,
}

impl fmt::Display for CatalogErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogErrorKind::NotFound => write!(f, "not found"),
            CatalogErrorKind::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Error type for downloader operations
#[derive(Debug, Clone)]
pub enum DownloaderError {
    /// Malformed or unreachable manifest, fatal for one work id
    ManifestError {
        message: String,
        work_id: Option<String>,
        source: Option<String>,
    },

    /// Catalog service errors
    CatalogError {
        message: String,
        kind: CatalogErrorKind,
        source: Option<String>,
    },

    /// Network or status failure while transferring one file
    TransferError {
        message: String,
        file: Option<String>,
        source: Option<String>,
    },

    /// Directory creation, file open or write failures
    FilesystemError {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },

    /// Invalid selection input
    SelectionError {
        message: String,
        field: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },
}

impl DownloaderError {
    /// Create a new ManifestError
    pub fn manifest_error(message: impl Into<String>) -> Self {
        DownloaderError::ManifestError {
            message: message.into(),
            work_id: None,
            source: None,
        }
    }

    /// Create a new ManifestError with work id and source
    pub fn manifest_error_full(
        message: impl Into<String>,
        work_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        DownloaderError::ManifestError {
            message: message.into(),
            work_id: Some(work_id.into()),
            source: Some(source.into()),
        }
    }

    /// Create a CatalogError of kind NotFound
    pub fn catalog_not_found(message: impl Into<String>) -> Self {
        DownloaderError::CatalogError {
            message: message.into(),
            kind: CatalogErrorKind::NotFound,
            source: None,
        }
    }

    /// Create a CatalogError of kind Unavailable
    pub fn catalog_unavailable(message: impl Into<String>, source: impl Into<String>) -> Self {
        DownloaderError::CatalogError {
            message: message.into(),
            kind: CatalogErrorKind::Unavailable,
            source: Some(source.into()),
        }
    }

    /// Create a new TransferError
    pub fn transfer_error(message: impl Into<String>) -> Self {
        DownloaderError::TransferError {
            message: message.into(),
            file: None,
            source: None,
        }
    }

    /// Create a new TransferError with file and source
    pub fn transfer_error_full(
        message: impl Into<String>,
        file: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        DownloaderError::TransferError {
            message: message.into(),
            file: Some(file.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new FilesystemError with path and source
    pub fn filesystem_error_full(
        message: impl Into<String>,
        path: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        DownloaderError::FilesystemError {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new SelectionError
    pub fn selection_error(message: impl Into<String>) -> Self {
        DownloaderError::SelectionError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new SelectionError with field
    pub fn selection_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        DownloaderError::SelectionError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        DownloaderError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        DownloaderError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Whether the failed operation may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloaderError::TransferError { .. } | DownloaderError::FilesystemError { .. } => true,
            DownloaderError::CatalogError { kind, .. } => *kind == CatalogErrorKind::Unavailable,
            _ => false,
        }
    }

    /// Returns the catalog error kind, if this is a catalog error
    pub fn catalog_kind(&self) -> Option<CatalogErrorKind> {
        match self {
            DownloaderError::CatalogError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        match &mut self {
            DownloaderError::ManifestError { source, .. }
            | DownloaderError::CatalogError { source, .. }
            | DownloaderError::TransferError { source, .. }
            | DownloaderError::FilesystemError { source, .. } => {
                *source = Some(source.as_ref().map_or_else(|| ctx.clone(), |s| format!("{}: {}", s, ctx)));
            }
            _ => {}
        }
        self
    }
}

impl fmt::Display for DownloaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloaderError::ManifestError { message, work_id, source } => {
                match (work_id, source) {
                    (Some(w), Some(s)) => write!(f, "Manifest error: {} (work: RJ{}, source: {})", message, w, s),
                    (Some(w), None) => write!(f, "Manifest error: {} (work: RJ{})", message, w),
                    (None, Some(s)) => write!(f, "Manifest error: {} (source: {})", message, s),
                    (None, None) => write!(f, "Manifest error: {}", message),
                }
            }
            DownloaderError::CatalogError { message, kind, source } => {
                if let Some(src) = source {
                    write!(f, "Catalog error ({}): {} (source: {})", kind, message, src)
                } else {
                    write!(f, "Catalog error ({}): {}", kind, message)
                }
            }
            DownloaderError::TransferError { message, file, source } => {
                match (file, source) {
                    (Some(p), Some(s)) => write!(f, "Transfer error: {} (file: {}, source: {})", message, p, s),
                    (Some(p), None) => write!(f, "Transfer error: {} (file: {})", message, p),
                    (None, Some(s)) => write!(f, "Transfer error: {} (source: {})", message, s),
                    (None, None) => write!(f, "Transfer error: {}", message),
                }
            }
            DownloaderError::FilesystemError { message, path, source } => {
                match (path, source) {
                    (Some(p), Some(s)) => write!(f, "Filesystem error: {} (path: {}, source: {})", message, p, s),
                    (Some(p), None) => write!(f, "Filesystem error: {} (path: {})", message, p),
                    (None, Some(s)) => write!(f, "Filesystem error: {} (source: {})", message, s),
                    (None, None) => write!(f, "Filesystem error: {}", message),
                }
            }
            DownloaderError::SelectionError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Selection error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Selection error: {}", message)
                }
            }
            DownloaderError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for DownloaderError {}

// Implement From traits for common error types

impl From<std::io::Error> for DownloaderError {
    fn from(err: std::io::Error) -> Self {
        DownloaderError::filesystem_error_full(err.to_string(), "unknown".to_string(), err.kind().to_string())
    }
}

impl From<reqwest::Error> for DownloaderError {
    fn from(err: reqwest::Error) -> Self {
        let address = err.url().map(|u| u.to_string()).unwrap_or_else(|| "unknown".to_string());
        DownloaderError::transfer_error_full("HTTP request failed", address, err.to_string())
    }
}

impl From<serde_json::Error> for DownloaderError {
    fn from(err: serde_json::Error) -> Self {
        DownloaderError::ManifestError {
            message: "Failed to decode JSON data".to_string(),
            work_id: None,
            source: Some(err.to_string()),
        }
    }
}

impl From<url::ParseError> for DownloaderError {
    fn from(err: url::ParseError) -> Self {
        DownloaderError::ManifestError {
            message: "Invalid URL".to_string(),
            work_id: None,
            source: Some(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for DownloaderError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        DownloaderError::transfer_error("Operation timed out")
    }
}

/// Result alias for library components
pub type Result<T> = std::result::Result<T, DownloaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_error() {
        let err = DownloaderError::manifest_error("Missing children");
        assert_eq!(err.to_string(), "Manifest error: Missing children");
    }

    #[test]
    fn test_manifest_error_full() {
        let err = DownloaderError::manifest_error_full("Bad manifest", "123456", "eof");
        assert!(err.to_string().contains("RJ123456"));
        assert!(err.to_string().contains("eof"));
    }

    #[test]
    fn test_catalog_error_kinds() {
        let err = DownloaderError::catalog_not_found("no such work");
        assert_eq!(err.catalog_kind(), Some(CatalogErrorKind::NotFound));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not found"));

        let err = DownloaderError::catalog_unavailable("gateway", "502");
        assert_eq!(err.catalog_kind(), Some(CatalogErrorKind::Unavailable));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transfer_error_full() {
        let err = DownloaderError::transfer_error_full("Connection reset", "t1.mp3", "os error 104");
        assert!(err.to_string().contains("Transfer error"));
        assert!(err.to_string().contains("t1.mp3"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err: DownloaderError = io_err.into();
        assert!(matches!(err, DownloaderError::FilesystemError { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_selection_error_not_retryable() {
        let err = DownloaderError::selection_error_with_field("Index out of range", "indices");
        assert!(err.to_string().contains("Selection error"));
        assert!(err.to_string().contains("indices"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_with_context() {
        let err = DownloaderError::transfer_error("reset").with_context("attempt 2/3");
        assert!(err.to_string().contains("attempt 2/3"));
    }

    #[test]
    fn test_config_error_with_field() {
        let err = DownloaderError::config_error_with_field("must be at least 1", "concurrency_limit");
        assert!(err.to_string().contains("Config error"));
        assert!(err.to_string().contains("concurrency_limit"));
    }
}
