//! Shared error types used across submodules.

use std::fmt;

use thiserror::Error;

/// Top-level error type for the crate.
///
/// Every variant is fatal for the operation that produced it. Recoverable
/// numerical conditions are reported as [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum NecError {
    /// Malformed or inconsistent geometry input.
    #[error("geometry error: {0}")]
    Geometry(String),
    /// A junction chain could not be walked or closed.
    #[error("connectivity error: {0}")]
    Connectivity(String),
    /// A pivot of the interaction matrix vanished during factorization.
    #[error("singular matrix at pivot {pivot}")]
    SingularMatrix {
        /// Zero-based column whose pivot was numerically zero.
        pivot: usize,
    },
    /// Inconsistent solver or ground configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// A load card could not be applied.
    #[error("load error: {0}")]
    Load(String),
    /// A network or transmission line card could not be applied.
    #[error("network error: {0}")]
    Network(String),
    /// An excitation card could not be applied.
    #[error("excitation error: {0}")]
    Excitation(String),
    /// A worker message did not match the expected framing.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A worker failed or disappeared.
    #[error("worker error: {0}")]
    Worker(String),
    /// Wraps I/O failures on worker channels.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NecError {
    /// Errors always abort the operation that raised them.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NecError>;

/// Distinguishes informational, recoverable and fatal conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Informational note.
    Info,
    /// Recoverable numerical condition; results are best effort.
    Warning,
    /// The step was aborted.
    Fatal,
}

/// A message attached to a per-frequency result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// How serious the condition is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a warning and mirrors it to the log.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!("{message}");
        Self {
            severity: Severity::Warning,
            message,
        }
    }

    /// Creates an informational note.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::info!("{message}");
        Self {
            severity: Severity::Info,
            message,
        }
    }
}

impl From<&NecError> for Diagnostic {
    fn from(err: &NecError) -> Self {
        Self {
            severity: err.severity(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        };
        write!(f, "{label}: {}", self.message)
    }
}
