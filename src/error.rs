//! Error taxonomy for the runner.
//!
//! Every failure is one of four kinds. Infrastructure and compile failures
//! are raised once from initialization and leave the runner permanently
//! failed. Invocation errors are scoped to a single call. `NotReady` is what
//! every call sees after the build did not produce an artifact.

use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::compile::BuildResult;

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Coarse classification used by drivers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Infrastructure,
    CompileFailure,
    Invocation,
    NotReady,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("bootstrap template not found at {path}: {source}")]
    TemplateMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn compiler `{program}`: {source}")]
    CompilerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compiler reported success but no executable exists at {0}")]
    ArtifactMissing(PathBuf),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid entry point name `{0}`")]
    InvalidEntryPoint(String),

    #[error("runner already initialized")]
    AlreadyInitialized,

    #[error("compilation failed (exit code {:?})", .0.exit_code)]
    CompileFailed(Box<BuildResult>),

    #[error("runtime not ready: no artifact was built")]
    NotReady,

    #[error("the action did not receive a dictionary as an argument")]
    InvalidPayload,

    #[error("failed to encode input payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to execute artifact {path}: {source}")]
    Execution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the action did not return a dictionary: {last_line:?}")]
    BadResult { last_line: String },
}

impl RunnerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::TemplateMissing { .. }
            | RunnerError::CompilerSpawn { .. }
            | RunnerError::ArtifactMissing(_)
            | RunnerError::Io { .. }
            | RunnerError::InvalidEntryPoint(_)
            | RunnerError::AlreadyInitialized => ErrorKind::Infrastructure,
            RunnerError::CompileFailed(_) => ErrorKind::CompileFailure,
            RunnerError::NotReady => ErrorKind::NotReady,
            RunnerError::InvalidPayload
            | RunnerError::Serialization(_)
            | RunnerError::Execution { .. }
            | RunnerError::BadResult { .. } => ErrorKind::Invocation,
        }
    }

    /// True for errors that end the process' ability to serve invocations.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Infrastructure | ErrorKind::CompileFailure
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }
}
