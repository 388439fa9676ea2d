//! Shared fixtures for runtime tests.
//!
//! The real compiler is replaced by `/bin/sh` one-liners so the lifecycle can
//! be exercised without a toolchain. Executable scripts are always written by
//! a child shell, never through a file handle held by the test process, so a
//! concurrent fork cannot leave the file busy when it is exec'd.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::{CompilerCommand, RunnerConfig};
use crate::runtime::environment::BaseEnvironment;

pub const TEST_BOOTSTRAP: &str =
    "// bootstrap\nfunc _run_main(_ f: () -> [String: Any]) { print(f()) }\n";

/// Artifact body that logs one line and echoes its input as the result.
pub const ECHO_ARTIFACT: &str = "#!/bin/sh\nprintf 'log line\\n'\nprintf '%s\\n' \"$WHISK_INPUT\"\n";

pub struct Workspace {
    pub dir: TempDir,
    pub config: RunnerConfig,
}

impl Workspace {
    pub fn new(compiler: CompilerCommand) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bootstrap_path = dir.path().join("epilogue.swift");
        std::fs::write(&bootstrap_path, TEST_BOOTSTRAP).unwrap();

        let config = RunnerConfig {
            bootstrap_path,
            source_path: dir.path().join("build").join("action.swift"),
            binary_path: dir.path().join("build").join("action"),
            compiler,
            build_timeout: Duration::from_secs(30),
        };
        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable script into the workspace and return its path.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join(name);
        install_script(&path, body);
        path
    }
}

pub fn install_script(path: &Path, body: &str) {
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg("printf '%s' \"$1\" > \"$2\" && chmod +x \"$2\"")
        .arg("sh")
        .arg(body)
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success(), "failed to install script {}", path.display());
}

/// `sh -c <script> sh {source} {output} <extra...>`: inside the script the
/// source is `$1`, the output is `$2` and extras follow.
pub fn sh_compiler(script: &str, extra: &[&str]) -> CompilerCommand {
    let mut args = vec![
        "-c".to_string(),
        script.to_string(),
        "sh".to_string(),
        "{source}".to_string(),
        "{output}".to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    CompilerCommand::new("/bin/sh").with_args(args)
}

/// Compiler that checks the source exists, then installs `artifact` as the
/// output binary.
pub fn copying_compiler(artifact: &Path) -> CompilerCommand {
    sh_compiler(
        "test -f \"$1\" && cp \"$3\" \"$2\" && chmod +x \"$2\"",
        &[artifact.to_str().unwrap()],
    )
}

/// Compiler that prints `message` on stderr and exits with `code`.
pub fn failing_compiler(message: &str, code: i32) -> CompilerCommand {
    sh_compiler(
        &format!("printf '%s' \"$3\" >&2; exit {}", code),
        &[message],
    )
}

pub fn base_env(pairs: &[(&str, &str)]) -> BaseEnvironment {
    BaseEnvironment::new(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    )
}
