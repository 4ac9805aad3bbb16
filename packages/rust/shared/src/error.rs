//! Error types for archmap.
//!
//! Library crates use [`ArchmapError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Plugin failures split three ways: a specifier that resolves to nothing
//! ([`ArchmapError::ModuleNotFound`]), a file that resolves but cannot be
//! loaded ([`ArchmapError::StageLoad`]), and a module that loads but does
//! not implement the requested stage capability
//! ([`ArchmapError::StageContract`]). Callers surface different remediation
//! for each: fix the path vs. fix the plugin.

use std::path::PathBuf;

/// Top-level error type for all archmap operations.
#[derive(Debug, thiserror::Error)]
pub enum ArchmapError {
    /// A module specifier resolved to no existing file or builtin.
    #[error("module not found: `{specifier}` ({tried} candidate path(s) probed under {})", .base.display())]
    ModuleNotFound {
        specifier: String,
        base: PathBuf,
        tried: usize,
    },

    /// A stage module file exists but could not be read or parsed.
    #[error("failed to load stage module {}: {message}", .path.display())]
    StageLoad { path: PathBuf, message: String },

    /// A stage module loaded but does not provide the required capability.
    #[error("module `{specifier}` does not provide the `{expected}` capability")]
    StageContract {
        specifier: String,
        expected: &'static str,
    },

    /// Configuration parsing or resolution error.
    #[error("config error: {message}")]
    ConfigValidation { message: String },

    /// IR violated an invariant during the validation stage.
    #[error("IR validation failed: {message}")]
    IrValidation { message: String },

    /// A stage implementation failed during its own logic; carries the
    /// stage name and, when applicable, the node's module specifier.
    #[error("stage `{stage}` failed (node `{}`): {source}", .node.as_deref().unwrap_or("-"))]
    StageExecution {
        stage: String,
        node: Option<String>,
        source: Box<ArchmapError>,
    },

    /// External plugin subprocess failure (spawn, protocol, or exit status).
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArchmapError>;

impl ArchmapError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: msg.into(),
        }
    }

    /// Create an IR validation error from any displayable message.
    pub fn ir_validation(msg: impl Into<String>) -> Self {
        Self::IrValidation {
            message: msg.into(),
        }
    }

    /// Create a stage-load error for a module file.
    pub fn stage_load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::StageLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a plugin subprocess error from any displayable message.
    pub fn plugin(msg: impl Into<String>) -> Self {
        Self::Plugin(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the failing stage and node to an error raised by a stage
    /// implementation. Errors that already carry stage context pass through.
    pub fn in_stage(self, stage: impl Into<String>, node: Option<&str>) -> Self {
        match self {
            already @ Self::StageExecution { .. } => already,
            other => Self::StageExecution {
                stage: stage.into(),
                node: node.map(str::to_owned),
                source: Box::new(other),
            },
        }
    }
}
