// INVARIANT:
// - State moves Uninitialized -> Ready or Uninitialized -> Failed, once.
// - Invocations never touch the filesystem unless the state is Ready.

// One-shot build lifecycle and invocation gating

use std::path::Path;

use tracing::{error, info, info_span};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::message::{ActionOutput, InitMessage, RunMessage};
use crate::runtime::compile::{verify_artifact, BuildCoordinator, BuildResult};
use crate::runtime::environment::BaseEnvironment;
use crate::runtime::exec::{ArtifactExecutor, PreparedInvocation};
use crate::runtime::synthesize::{load_bootstrap, resolve_entry_point, synthesize, write_program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Uninitialized,
    Ready,
    Failed,
}

#[derive(Debug)]
pub struct ActionRunner {
    config: RunnerConfig,
    base_env: BaseEnvironment,
    state: RunnerState,
    build: Option<BuildResult>,
}

impl ActionRunner {
    pub fn new(config: RunnerConfig, base_env: BaseEnvironment) -> Self {
        Self {
            config,
            base_env,
            state: RunnerState::Uninitialized,
            build: None,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == RunnerState::Ready
    }

    /// Result of the compiler run, if one happened.
    pub fn build_result(&self) -> Option<&BuildResult> {
        self.build.as_ref()
    }

    pub fn binary_path(&self) -> &Path {
        &self.config.binary_path
    }

    /// Synthesize, compile and verify the action. Only the first call does
    /// any work; later calls fail with [`RunnerError::AlreadyInitialized`].
    pub fn initialize(&mut self, message: &InitMessage) -> RunnerResult<BuildResult> {
        if self.state != RunnerState::Uninitialized {
            return Err(RunnerError::AlreadyInitialized);
        }

        let _span = info_span!("initialize").entered();
        let outcome = self.prepare_and_build(message);
        self.state = match &outcome {
            Ok(_) => RunnerState::Ready,
            Err(e) => {
                error!(error = %e, "initialization failed");
                RunnerState::Failed
            }
        };
        outcome
    }

    fn prepare_and_build(&mut self, message: &InitMessage) -> RunnerResult<BuildResult> {
        let entry_point = resolve_entry_point(message.main.as_deref())?;
        let bootstrap = load_bootstrap(&self.config.bootstrap_path)?;

        info!(entry_point = %entry_point, "synthesizing program");
        let program = synthesize(&message.code, &entry_point, &bootstrap);
        write_program(&program, &self.config.source_path)?;

        let result = BuildCoordinator::new(&self.config).build()?;
        self.build = Some(result.clone());
        if !result.success {
            return Err(RunnerError::CompileFailed(Box::new(result)));
        }

        if !verify_artifact(&self.config.binary_path) {
            return Err(RunnerError::ArtifactMissing(self.config.binary_path.clone()));
        }
        info!(binary = %self.config.binary_path.display(), "artifact ready");
        Ok(result)
    }

    /// Build the invocation environment for `request`, failing fast when no
    /// artifact is available.
    pub fn prepare(&self, request: &RunMessage) -> RunnerResult<PreparedInvocation> {
        if self.state != RunnerState::Ready {
            return Err(RunnerError::NotReady);
        }
        let env = self.base_env.build_environment(request)?;
        Ok(PreparedInvocation {
            binary: self.config.binary_path.clone(),
            env,
        })
    }

    pub fn invoke<E: ArtifactExecutor + ?Sized>(
        &self,
        executor: &E,
        request: &RunMessage,
    ) -> RunnerResult<ActionOutput> {
        let _span = info_span!(
            "invoke",
            activation_id = request.activation_id.as_deref().unwrap_or("")
        )
        .entered();

        let invocation = self.prepare(request)?;
        let output = executor.execute(&invocation)?;
        info!(exit_code = ?output.exit_code, "invocation complete");
        Ok(output)
    }
}
