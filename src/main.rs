use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use action_runner::runtime::synthesize::load_bootstrap;
use action_runner::{
    resolve_entry_point, synthesize, ActionRunner, BaseEnvironment, InitMessage, ProcessExecutor,
    RunMessage, RunnerConfig, RunnerError,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Compile an action once and run it against input payloads
#[derive(Parser)]
#[command(name = "action-runner")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "ACTION_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "ACTION_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the synthesized program without compiling it
    Synthesize(SourceArgs),
    /// Synthesize and compile, then print the build result as JSON
    Build(SourceArgs),
    /// Build, then run the artifact once per --value
    Invoke {
        #[command(flatten)]
        source: SourceArgs,

        /// JSON object passed to the action (repeatable)
        #[arg(long = "value", default_value = "{}")]
        values: Vec<String>,

        /// Activation id exposed as __OW_ACTIVATION_ID
        #[arg(long)]
        activation_id: Option<String>,

        /// Deadline exposed as __OW_DEADLINE
        #[arg(long)]
        deadline: Option<String>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// User source file
    source: PathBuf,

    /// Entry point called by the bootstrap fragment (default: main)
    #[arg(long)]
    main: Option<String>,

    /// Bootstrap fragment appended to the source
    #[arg(long)]
    bootstrap: Option<PathBuf>,

    /// Where the synthesized program is written
    #[arg(long)]
    source_path: Option<PathBuf>,

    /// Where the compiled artifact is written
    #[arg(long)]
    binary_path: Option<PathBuf>,

    /// Kill the compiler after this many seconds
    #[arg(long)]
    build_timeout_secs: Option<u64>,
}

impl SourceArgs {
    fn config(&self) -> Result<RunnerConfig> {
        let mut config = RunnerConfig::from_env()?;
        if let Some(path) = &self.bootstrap {
            config.bootstrap_path = path.clone();
        }
        if let Some(path) = &self.source_path {
            config.source_path = path.clone();
        }
        if let Some(path) = &self.binary_path {
            config.binary_path = path.clone();
        }
        if let Some(secs) = self.build_timeout_secs {
            config.build_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    fn init_message(&self) -> Result<InitMessage> {
        let code = fs::read_to_string(&self.source)
            .with_context(|| format!("failed to read {}", self.source.display()))?;
        Ok(InitMessage {
            code,
            main: self.main.clone(),
        })
    }
}

fn init_tracing(cli: &Cli) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    // Logs go to stderr; stdout carries results
    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match &cli.command {
        Commands::Synthesize(args) => {
            let config = args.config()?;
            let message = args.init_message()?;
            let entry_point = resolve_entry_point(message.main.as_deref())?;
            let bootstrap = load_bootstrap(&config.bootstrap_path)?;
            print!("{}", synthesize(&message.code, &entry_point, &bootstrap).text);
            Ok(())
        }
        Commands::Build(args) => {
            let runner = initialized_runner(args)?;
            if let Some(result) = runner.build_result() {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            Ok(())
        }
        Commands::Invoke {
            source,
            values,
            activation_id,
            deadline,
        } => {
            let runner = initialized_runner(source)?;
            for raw in values {
                let value = serde_json::from_str(raw)
                    .with_context(|| format!("--value is not valid JSON: {}", raw))?;
                let request = RunMessage {
                    value: Some(value),
                    activation_id: activation_id.clone(),
                    deadline: deadline.clone(),
                    ..RunMessage::default()
                };
                match runner.invoke(&ProcessExecutor, &request) {
                    Ok(output) => println!("{}", serde_json::to_string(&output)?),
                    Err(e) if !e.is_fatal() => {
                        println!("{}", serde_json::json!({ "error": e.to_string() }))
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        }
    }
}

fn initialized_runner(args: &SourceArgs) -> Result<ActionRunner> {
    let config = args.config()?;
    let message = args.init_message()?;
    let mut runner = ActionRunner::new(config, BaseEnvironment::from_process());

    match runner.initialize(&message) {
        Ok(_) => Ok(runner),
        Err(RunnerError::CompileFailed(result)) => {
            eprint!("{}", result.diagnostics());
            bail!(
                "the action failed to generate or locate a binary (exit code {:?})",
                result.exit_code
            )
        }
        Err(e) => Err(e.into()),
    }
}
