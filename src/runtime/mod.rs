// Runtime module - build-once, run-many lifecycle for a compiled action
// Leaf first: synthesize -> compile -> runner; environment and exec are
// used per invocation.

pub mod synthesize;
pub mod compile;
pub mod environment;
pub mod exec;
pub mod runner;

#[cfg(all(test, unix))]
mod test_support;






// Re-export the driver-facing surface
pub use synthesize::{resolve_entry_point, synthesize, SynthesizedProgram, RUN_MAIN};
pub use compile::{verify_artifact, BuildCoordinator, BuildResult};
pub use environment::{BaseEnvironment, InvocationEnvironment, INPUT_ENV_VAR};
pub use exec::{ArtifactExecutor, PreparedInvocation, ProcessExecutor};
pub use runner::{ActionRunner, RunnerState};
