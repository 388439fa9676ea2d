// Library interface for action-runner
// Exposes the build/invoke lifecycle to drivers and tests

pub mod config;
pub mod error;
pub mod message;
pub mod runtime;

pub use config::{CompilerCommand, RunnerConfig};
pub use error::{ErrorKind, RunnerError, RunnerResult};
pub use message::{ActionOutput, InitMessage, RunMessage, DEFAULT_ENTRY_POINT};
pub use runtime::*;
