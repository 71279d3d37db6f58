//! Error types and handling for mountplan
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//! One enum covers the whole taxonomy: reference parsing, source resolution,
//! bundle loading, include cycles, and validation.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for mountplan operations
#[derive(Error, Diagnostic, Debug)]
pub enum MountplanError {
    // Reference errors
    #[error("Invalid source reference '{reference}': {reason}")]
    #[diagnostic(
        code(mountplan::reference::invalid),
        help(
            "Valid forms: git+https://host/org/repo[@ref][#subdirectory=path], zip+https://host/archive.zip, zip+file:///archive.zip, ./path, /path, ~/path, name, namespace:path"
        )
    )]
    InvalidReference { reference: String, reason: String },

    #[error("Requested ref or subpath not found in '{reference}': {detail}")]
    #[diagnostic(code(mountplan::reference::not_found))]
    ReferenceNotFound { reference: String, detail: String },

    // Source errors
    #[error("Source unavailable: {source_ref}: {reason}")]
    #[diagnostic(
        code(mountplan::source::unavailable),
        help("Check network connectivity and that the source location exists and is readable")
    )]
    SourceUnavailable { source_ref: String, reason: String },

    // Bundle errors
    #[error("Bundle '{name}' not found")]
    #[diagnostic(
        code(mountplan::bundle::not_found),
        help(
            "Check that the bundle name is registered or the reference points at a bundle definition"
        )
    )]
    BundleNotFound { name: String },

    #[error("Failed to load bundle: {reason}")]
    #[diagnostic(code(mountplan::bundle::load_failed))]
    BundleLoad { reason: String },

    #[error("Circular dependency detected: {chain}")]
    #[diagnostic(
        code(mountplan::bundle::circular),
        help("Remove the include cycle from the bundle definitions")
    )]
    CircularDependency { chain: String },

    #[error("Bundle validation failed: {message}")]
    #[diagnostic(code(mountplan::bundle::validation_failed))]
    BundleValidation { message: String },

    // File system errors
    #[error("IO error: {message}")]
    #[diagnostic(code(mountplan::fs::io_error))]
    Io { message: String },
}

impl MountplanError {
    /// Creates an invalid reference error
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        MountplanError::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Creates a ref-or-subpath not found error
    pub fn reference_not_found(reference: impl Into<String>, detail: impl Into<String>) -> Self {
        MountplanError::ReferenceNotFound {
            reference: reference.into(),
            detail: detail.into(),
        }
    }

    /// Creates a source unavailable error
    pub fn source_unavailable(source_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        MountplanError::SourceUnavailable {
            source_ref: source_ref.into(),
            reason: reason.into(),
        }
    }

    /// Creates a bundle not found error
    pub fn bundle_not_found(name: impl Into<String>) -> Self {
        MountplanError::BundleNotFound { name: name.into() }
    }

    /// Creates a bundle load error
    pub fn bundle_load(reason: impl Into<String>) -> Self {
        MountplanError::BundleLoad {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for MountplanError {
    fn from(err: std::io::Error) -> Self {
        MountplanError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for MountplanError {
    fn from(err: serde_yaml::Error) -> Self {
        MountplanError::BundleLoad {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MountplanError {
    fn from(err: serde_json::Error) -> Self {
        MountplanError::BundleLoad {
            reason: err.to_string(),
        }
    }
}

impl From<git2::Error> for MountplanError {
    fn from(err: git2::Error) -> Self {
        MountplanError::SourceUnavailable {
            source_ref: "git".to_string(),
            reason: err.message().to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, MountplanError>;
