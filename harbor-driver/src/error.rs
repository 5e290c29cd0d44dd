use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes registry errors by their semantic meaning, independent of
/// the driver that talks to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryErrorKind {
    /// The requested project, repository, artifact or tag does not exist.
    NotFound,

    /// The credentials in use may not perform the requested operation.
    PermissionDenied,

    /// The request failed in transit (network, connection reset, etc.).
    Io,

    /// The registry is temporarily unable to serve requests.
    ServiceUnavailable,

    /// The request was rejected as malformed.
    InvalidRequest,

    /// A response could not be decoded.
    SerializationError,

    /// Anything not covered above.
    Other,
}

impl RegistryErrorKind {
    /// Returns whether this error kind typically indicates a transient condition.
    ///
    /// Advisory only: the pipeline never retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RegistryErrorKind::ServiceUnavailable | RegistryErrorKind::Io
        )
    }
}

impl fmt::Display for RegistryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryErrorKind::NotFound => write!(f, "not found"),
            RegistryErrorKind::PermissionDenied => write!(f, "permission denied"),
            RegistryErrorKind::Io => write!(f, "I/O error"),
            RegistryErrorKind::ServiceUnavailable => write!(f, "service unavailable"),
            RegistryErrorKind::InvalidRequest => write!(f, "invalid request"),
            RegistryErrorKind::SerializationError => write!(f, "serialization error"),
            RegistryErrorKind::Other => write!(f, "other error"),
        }
    }
}

#[derive(Debug)]
struct ErrorTrace {
    /// Controlled by RUST_BACKTRACE.
    backtrace: Backtrace,

    /// Span context at the point the error was created.
    span_trace: SpanTrace,
}

impl ErrorTrace {
    #[track_caller]
    fn capture() -> Self {
        ErrorTrace {
            backtrace: Backtrace::capture(),
            span_trace: SpanTrace::capture(),
        }
    }
}

/// An error returned by a registry driver.
///
/// Carries the semantic [`RegistryErrorKind`], the name of the driver
/// that produced it, whatever registry coordinates were known at the
/// time (project, repository, reference) and the underlying error.
///
/// # Example
///
/// ```rust
/// use harbor_driver::{RegistryError, RegistryErrorKind};
///
/// let error = RegistryError::builder("memory", RegistryErrorKind::NotFound, "no such tag")
///     .project("library")
///     .repository("nginx")
///     .reference("latest")
///     .build();
///
/// assert_eq!(error.kind(), RegistryErrorKind::NotFound);
/// assert_eq!(error.reference(), Some("latest"));
/// ```
#[derive(Debug)]
pub struct RegistryError {
    kind: RegistryErrorKind,
    engine: &'static str,
    project: Option<String>,
    repository: Option<String>,
    reference: Option<String>,
    context: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
    traces: Box<ErrorTrace>,
}

impl StdError for RegistryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl RegistryError {
    /// Create a new registry error with the minimum required information.
    ///
    /// For more control, use `RegistryError::builder()`.
    pub fn new<E>(engine: &'static str, kind: RegistryErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            kind,
            engine,
            project: None,
            repository: None,
            reference: None,
            context: None,
            source: error.into(),
            traces: Box::new(ErrorTrace::capture()),
        }
    }

    /// Create a builder for a registry error with additional context.
    pub fn builder<E>(
        engine: &'static str,
        kind: RegistryErrorKind,
        error: E,
    ) -> RegistryErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        RegistryErrorBuilder {
            kind,
            engine,
            source: error.into(),
            project: None,
            repository: None,
            reference: None,
            context: None,
        }
    }

    /// Returns a boxed closure that creates a registry error from a downstream error,
    /// for use with `.map_err()`.
    pub fn with<E>(
        engine: &'static str,
        kind: RegistryErrorKind,
    ) -> Box<dyn FnOnce(E) -> RegistryError + Send + Sync>
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Box::new(move |error: E| RegistryError::new(engine, kind, error))
    }

    /// Returns the error kind.
    pub fn kind(&self) -> RegistryErrorKind {
        self.kind
    }

    /// Returns the driver name.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Returns the project name, if available.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Returns the repository name, if available.
    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    /// Returns the tag or digest reference, if available.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Returns additional context, if available.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns whether this error is likely transient.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Returns a reference to the captured backtrace.
    pub fn backtrace(&self) -> &Backtrace {
        &self.traces.backtrace
    }

    /// Returns a reference to the captured span trace.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.traces.span_trace
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry error [{}] from {}", self.kind, self.engine)?;

        match (&self.project, &self.repository, &self.reference) {
            (Some(project), Some(repository), Some(reference)) => {
                write!(f, " ({project}/{repository}:{reference})")?
            }
            (Some(project), Some(repository), None) => write!(f, " ({project}/{repository})")?,
            (Some(project), None, _) => write!(f, " (project: {project})")?,
            _ => {}
        }

        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }

        write!(f, ": {}", self.source)
    }
}

/// Builder for a `RegistryError` with optional registry coordinates.
#[derive(Debug)]
pub struct RegistryErrorBuilder {
    kind: RegistryErrorKind,
    engine: &'static str,
    source: Box<dyn StdError + Send + Sync + 'static>,
    project: Option<String>,
    repository: Option<String>,
    reference: Option<String>,
    context: Option<String>,
}

impl RegistryErrorBuilder {
    /// Set the project name.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the repository name.
    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Set the tag or digest reference.
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Set additional context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build the `RegistryError`.
    pub fn build(self) -> RegistryError {
        RegistryError {
            kind: self.kind,
            engine: self.engine,
            project: self.project,
            repository: self.repository,
            reference: self.reference,
            context: self.context,
            source: self.source,
            traces: Box::new(ErrorTrace::capture()),
        }
    }
}
