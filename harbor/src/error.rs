//! Errors that abort an operation before any per-item work starts.

use camino::Utf8PathBuf;
use harbor_driver::RegistryError;

/// Result type for pipeline operations.
pub type HarborResult<T> = Result<T, HarborError>;

/// Setup failures for pipeline operations.
///
/// Failures of individual projects, images or tags never surface here;
/// they are logged by the stage that saw them.
#[derive(Debug, thiserror::Error)]
pub enum HarborError {
    /// The registry refused a call the operation cannot proceed without.
    #[error("{context}: {source}")]
    Registry {
        /// What the operation was doing.
        context: &'static str,
        /// The driver error.
        #[source]
        source: RegistryError,
    },

    /// The result manifest could not be read.
    #[error("failed to read file {path}")]
    ReadManifest {
        /// Manifest location.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The result manifest is not a valid integrity check file.
    #[error("failed to parse file {path}")]
    ParseManifest {
        /// Manifest location.
        path: Utf8PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The manifest could not be serialized.
    #[error("failed to serialize integrity check file")]
    SerializeManifest(#[source] serde_yaml_ng::Error),

    /// The caller's expected tag count disagrees with the manifest.
    #[error("expected {expected} tags to be deleted, file contains {actual} tags")]
    CountMismatch {
        /// Count supplied by the caller.
        expected: usize,
        /// Count declared by the manifest.
        actual: usize,
    },

    /// An image reference was not of the form `project/repository:tag`.
    #[error("invalid image reference {image:?}: {reason}")]
    InvalidImageRef {
        /// The rejected reference.
        image: String,
        /// What was missing.
        reason: &'static str,
    },

    /// A single manifest check failed.
    #[error("failed to get manifest for image {image}")]
    Manifest {
        /// The image that was checked.
        image: String,
        /// The driver error.
        #[source]
        source: RegistryError,
    },
}

impl HarborError {
    /// Returns a closure turning a driver error into a setup failure, for `.map_err()`.
    pub(crate) fn registry(context: &'static str) -> impl FnOnce(RegistryError) -> HarborError {
        move |source| HarborError::Registry { context, source }
    }
}

/// Errors loading a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("reading {path}")]
    Io {
        /// Config file location.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config is not valid TOML for the pipeline settings.
    #[error("parsing pipeline configuration")]
    Parse(#[from] toml_edit::de::Error),
}
