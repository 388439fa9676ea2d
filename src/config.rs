//! Runner configuration.
//!
//! Defaults match the conventional container layout. Each value can be
//! overridden from the environment:
//! - `ACTION_BOOTSTRAP_PATH`: bootstrap fragment appended to user source (default: ./epilogue.swift)
//! - `ACTION_SOURCE_PATH`: where the synthesized program is written (default: /swiftAction/action.swift)
//! - `ACTION_BINARY_PATH`: where the compiler writes the artifact (default: /swiftAction/action)
//! - `ACTION_COMPILER`: whitespace separated compiler argv, `{source}`/`{output}` are substituted
//! - `ACTION_BUILD_TIMEOUT_SECS`: upper bound on the compiler run (default: 300)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_BOOTSTRAP_PATH: &str = "./epilogue.swift";
pub const DEFAULT_SOURCE_PATH: &str = "/swiftAction/action.swift";
pub const DEFAULT_BINARY_PATH: &str = "/swiftAction/action";
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;

/// Placeholder replaced with the synthesized program path.
pub const SOURCE_PLACEHOLDER: &str = "{source}";
/// Placeholder replaced with the artifact path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// External compiler invocation. `args` may reference the source and output
/// paths through [`SOURCE_PLACEHOLDER`] and [`OUTPUT_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl CompilerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    /// Build from an argv vector (first element is the program).
    pub fn from_vec(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Arguments with placeholders replaced by concrete paths.
    pub fn resolve_args(&self, source: &std::path::Path, output: &std::path::Path) -> Vec<String> {
        let source = source.display().to_string();
        let output = output.display().to_string();
        self.args
            .iter()
            .map(|a| {
                a.replace(SOURCE_PLACEHOLDER, &source)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl Default for CompilerCommand {
    fn default() -> Self {
        CompilerCommand::new("swiftc").with_args([
            "-v",
            "-Xfrontend",
            "-debug-time-function-bodies",
            "-O",
            SOURCE_PLACEHOLDER,
            "-o",
            OUTPUT_PLACEHOLDER,
        ])
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bootstrap fragment appended after the user source
    pub bootstrap_path: PathBuf,

    /// Destination of the synthesized program
    pub source_path: PathBuf,

    /// Destination of the compiled artifact
    pub binary_path: PathBuf,

    pub compiler: CompilerCommand,

    /// Compiler runs longer than this are killed and reported as failed builds
    pub build_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            bootstrap_path: PathBuf::from(DEFAULT_BOOTSTRAP_PATH),
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            binary_path: PathBuf::from(DEFAULT_BINARY_PATH),
            compiler: CompilerCommand::default(),
            build_timeout: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`RunnerConfig::from_env`] with the variables supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("ACTION_BOOTSTRAP_PATH") {
            config.bootstrap_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("ACTION_SOURCE_PATH") {
            config.source_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("ACTION_BINARY_PATH") {
            config.binary_path = PathBuf::from(path);
        }
        if let Some(compiler) = lookup("ACTION_COMPILER") {
            config.compiler = parse_compiler(&compiler).context("invalid ACTION_COMPILER")?;
        }
        if let Some(secs) = lookup("ACTION_BUILD_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .context("invalid ACTION_BUILD_TIMEOUT_SECS format")?;
            config.build_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// The three hand-off paths must be distinct.
    pub fn validate(&self) -> Result<()> {
        if self.source_path == self.binary_path {
            bail!(
                "source and binary paths must differ (both are {})",
                self.source_path.display()
            );
        }
        if self.bootstrap_path == self.source_path || self.bootstrap_path == self.binary_path {
            bail!(
                "bootstrap path {} collides with an output path",
                self.bootstrap_path.display()
            );
        }
        if self.build_timeout.is_zero() {
            bail!("build timeout must be positive");
        }
        Ok(())
    }
}

/// Split a whitespace separated compiler command line.
pub fn parse_compiler(line: &str) -> Result<CompilerCommand> {
    let argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    CompilerCommand::from_vec(&argv).context("compiler command is empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_compiler_matches_conventional_argv() {
        let compiler = CompilerCommand::default();
        assert_eq!(compiler.program, "swiftc");
        let args = compiler.resolve_args(Path::new("/a/action.swift"), Path::new("/a/action"));
        assert_eq!(
            args,
            vec![
                "-v",
                "-Xfrontend",
                "-debug-time-function-bodies",
                "-O",
                "/a/action.swift",
                "-o",
                "/a/action",
            ]
        );
    }

    #[test]
    fn test_parse_compiler_splits_argv() {
        let compiler = parse_compiler("  cc  -O2 {source} -o {output} ").unwrap();
        assert_eq!(compiler.program, "cc");
        assert_eq!(compiler.args, vec!["-O2", "{source}", "-o", "{output}"]);
        assert!(parse_compiler("   ").is_err());
    }

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_from_lookup_without_overrides_is_default() {
        let config = RunnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bootstrap_path, PathBuf::from(DEFAULT_BOOTSTRAP_PATH));
        assert_eq!(config.source_path, PathBuf::from(DEFAULT_SOURCE_PATH));
        assert_eq!(config.binary_path, PathBuf::from(DEFAULT_BINARY_PATH));
        assert_eq!(config.compiler, CompilerCommand::default());
        assert_eq!(
            config.build_timeout,
            Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("ACTION_BOOTSTRAP_PATH", "/opt/epilogue.swift"),
            ("ACTION_SOURCE_PATH", "/work/main.swift"),
            ("ACTION_BINARY_PATH", "/work/main"),
            ("ACTION_COMPILER", "swiftc -Onone {source} -o {output}"),
            ("ACTION_BUILD_TIMEOUT_SECS", " 42 "),
        ]))
        .unwrap();

        assert_eq!(config.bootstrap_path, PathBuf::from("/opt/epilogue.swift"));
        assert_eq!(config.source_path, PathBuf::from("/work/main.swift"));
        assert_eq!(config.binary_path, PathBuf::from("/work/main"));
        assert_eq!(config.compiler.program, "swiftc");
        assert_eq!(config.compiler.args, vec!["-Onone", "{source}", "-o", "{output}"]);
        assert_eq!(config.build_timeout, Duration::from_secs(42));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = RunnerConfig::from_lookup(lookup(&[("ACTION_BUILD_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("ACTION_BUILD_TIMEOUT_SECS"));

        let err = RunnerConfig::from_lookup(lookup(&[("ACTION_BUILD_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));

        let err = RunnerConfig::from_lookup(lookup(&[("ACTION_COMPILER", "  ")])).unwrap_err();
        assert!(err.to_string().contains("ACTION_COMPILER"));

        let err = RunnerConfig::from_lookup(lookup(&[
            ("ACTION_SOURCE_PATH", "/same"),
            ("ACTION_BINARY_PATH", "/same"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_validate_rejects_colliding_paths() {
        let mut config = RunnerConfig::default();
        assert!(config.validate().is_ok());

        config.binary_path = config.source_path.clone();
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.bootstrap_path = config.binary_path.clone();
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.build_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
