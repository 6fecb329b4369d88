//! Error handling for the semantic core
//!
//! User mistakes are not errors in this sense: they are reported through
//! [`Diagnostics`](super::Diagnostics) and analysis keeps going. The variants
//! here abort the current operation.

use std::path::PathBuf;

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error of an analysis or resolution run
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Analysis ====================

    /// A language feature the analyzer does not handle yet
    #[error("not yet supported: {what}")]
    Todo { what: String, span: Option<Span> },

    // ==================== Module Resolution ====================

    #[error("cannot find dependency modules: {}", names.join(", "))]
    MissingModules { names: Vec<String> },

    #[error("dependency cycle between modules '{from}' and '{to}'")]
    DependencyCycle { from: String, to: String },

    #[error("module '{dependent}' depends on a program module")]
    ProgramModuleDependedUpon { dependent: String },

    #[error("module error: {0}")]
    ModuleError(String),

    // ==================== Input ====================

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed module header {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a not-yet-supported feature at `span`
    pub fn todo(what: impl Into<String>, span: Span) -> Self {
        Self::Todo { what: what.into(), span: Some(span) }
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Todo { span, .. } => *span,
            Self::MissingModules { .. }
            | Self::DependencyCycle { .. }
            | Self::ProgramModuleDependedUpon { .. }
            | Self::ModuleError(_)
            | Self::Io { .. }
            | Self::Header { .. }
            | Self::Config(_) => None,
        }
    }

    /// Whether this error reports an unimplemented feature rather than bad input
    pub fn is_todo(&self) -> bool {
        matches!(self, Self::Todo { .. })
    }
}
