mod error;
mod report;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use restscript_core::ast::Script;
use restscript_core::config::Config;
use restscript_core::executor::{ExecutionContext, ScriptExecutor, SessionSnapshot};
use restscript_core::http::ReqwestClient;
use restscript_core::resolver::ServiceResolver;
use restscript_core::result::{ScriptStatus, SuiteReport};
use restscript_core::runner::SuiteRunner;
use restscript_core::suite::{self, ScriptLocator, SuiteDescription};
use restscript_core::transform::BuiltinTransforms;
use restscript_core::value::Value;

use crate::error::AutoError;

/// Runner for REST request scripts and suites.
#[derive(Parser)]
#[command(name = "restscript-auto")]
#[command(about = "Run REST request scripts and suites against configured services")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.restscript/config.yaml)
    #[arg(short, long, global = true, env = "RESTSCRIPT_CONFIG")]
    config: Option<PathBuf>,

    /// Environment to use instead of the configured default
    #[arg(short, long, global = true, env = "RESTSCRIPT_ENV")]
    env: Option<String>,

    /// Header sent with every request, as KEY:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_name = "KEY:VALUE", global = true)]
    headers: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run one or more scripts
    Run {
        /// Script paths or names (looked up with a .req extension too),
        /// then parameters as key=value
        #[arg(required = true, value_name = "SCRIPT|KEY=VALUE")]
        args: Vec<String>,
        /// Run the scripts concurrently
        #[arg(long)]
        parallel: bool,
        /// With several scripts, stop after the first one that does not pass
        #[arg(long)]
        stop_on_error: bool,
    },
    /// Run a YAML suite of scripts
    Suite {
        /// Path to the suite file
        suite: PathBuf,
        /// Parameters as key=value, seeded into every script
        params: Vec<String>,
        /// Keep running after a failed or errored unit
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Parse a script and list its statements without running it
    Check {
        /// Script path or name
        script: String,
    },
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "restscript-auto.log".to_string());
            let file_appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), AutoError> {
    match &cli.command {
        Command::Run {
            args,
            parallel,
            stop_on_error,
        } => {
            let (scripts, params) = split_run_args(args);
            let params = parse_params(&params)?;
            if scripts.len() > 1 || *parallel {
                let description = SuiteDescription::adhoc(scripts, *parallel, *stop_on_error);
                let plan = suite::plan(&description, &ScriptLocator::new(None))?;
                let runner = SuiteRunner::new(ScriptExecutor::new(Arc::new(build_context(&cli)?)));
                let report = runner.run(&plan, &params).await;
                return finish_suite(&report, cli.format);
            }

            let Some(script_id) = scripts.into_iter().next() else {
                return Err(AutoError::InvalidArgument("no script given".to_string()));
            };
            let script = load_named_script(&script_id)?;
            let executor = ScriptExecutor::new(Arc::new(build_context(&cli)?));

            let result = executor.run(&script_id, &script, &params).await;
            match cli.format {
                OutputFormat::Json => println!("{}", to_json(&result)?),
                OutputFormat::Text => print!("{}", report::format_result(&result)),
            }

            let line = result.failed_at.unwrap_or_default();
            let message = result.message.unwrap_or_default();
            match result.status {
                ScriptStatus::Pass => Ok(()),
                ScriptStatus::Fail => Err(AutoError::AssertionFailed { message, line }),
                ScriptStatus::Error => Err(AutoError::Runtime {
                    message,
                    line: result.failed_at,
                }),
            }
        }
        Command::Suite {
            suite: path,
            params,
            continue_on_error,
        } => {
            let params = parse_params(params)?;
            let mut plan = suite::plan_file(path)?;
            if *continue_on_error {
                plan.options.stop_on_error = false;
            }
            info!(suite = %plan.name, units = plan.units.len(), "planned suite");

            let runner = SuiteRunner::new(ScriptExecutor::new(Arc::new(build_context(&cli)?)));
            let report = runner.run(&plan, &params).await;
            finish_suite(&report, cli.format)
        }
        Command::Check { script } => {
            let parsed = load_named_script(script)?;
            match cli.format {
                OutputFormat::Json => {
                    let statements: Vec<_> = parsed
                        .statements
                        .iter()
                        .map(|s| {
                            serde_json::json!({
                                "line": s.line,
                                "kind": report::kind_name(&s.kind),
                                "source": s.source.trim(),
                            })
                        })
                        .collect();
                    println!("{}", to_json(&serde_json::json!({ "script": script, "statements": statements }))?);
                }
                OutputFormat::Text => print!("{}", report::format_statements(&parsed)),
            }
            Ok(())
        }
    }
}

fn finish_suite(report: &SuiteReport, format: OutputFormat) -> Result<(), AutoError> {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Text => print!("{}", report::format_report(report)),
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(AutoError::SuiteFailed {
            failed: report.failed,
            errored: report.errored,
        })
    }
}

fn build_context(cli: &Cli) -> Result<ExecutionContext, AutoError> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(timeout) = cli.timeout {
        config.timeout_ms = timeout;
    }
    debug!(services = config.services.len(), timeout_ms = config.timeout_ms, "loaded configuration");

    let mut session = SessionSnapshot::default();
    for header in &cli.headers {
        let (name, value) = parse_header(header)?;
        session = session.with_header(name, value);
    }

    let mut resolver = ServiceResolver::new(config.clone());
    if let Some(env) = &cli.env {
        resolver = resolver.with_environment(env.clone());
    }
    let client = ReqwestClient::new().map_err(|e| AutoError::Runtime {
        message: e.to_string(),
        line: None,
    })?;

    Ok(ExecutionContext::new(
        Arc::new(resolver),
        Arc::new(client),
        Arc::new(BuiltinTransforms::from_config(&config)),
    )
    .with_session(session)
    .with_timeout(config.timeout_ms))
}

fn load_named_script(id: &str) -> Result<Script, AutoError> {
    let path = ScriptLocator::new(None).locate(id).ok_or_else(|| {
        AutoError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("script not found: {}", id),
        ))
    })?;
    Ok(suite::load_script(id, &path)?)
}

/// Separates `run` arguments into script names and `key=value` parameters.
fn split_run_args(args: &[String]) -> (Vec<String>, Vec<String>) {
    args.iter().cloned().partition(|arg| !arg.contains('='))
}

fn parse_params(pairs: &[String]) -> Result<BTreeMap<String, Value>, AutoError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), Value::String(value.to_string())))
            }
            _ => Err(AutoError::InvalidArgument(format!(
                "expected key=value, got '{}'",
                pair
            ))),
        })
        .collect()
}

fn parse_header(header: &str) -> Result<(String, String), AutoError> {
    match header.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(AutoError::InvalidArgument(format!(
            "expected KEY:VALUE header, got '{}'",
            header
        ))),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AutoError> {
    serde_json::to_string_pretty(value).map_err(|e| AutoError::Io(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["user_id=1".to_string(), "q=a=b".to_string()]).unwrap();
        assert_eq!(params.get("user_id"), Some(&Value::from("1")));
        assert_eq!(params.get("q"), Some(&Value::from("a=b")));
        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_split_run_args() {
        let args = ["a.req", "id=7", "b", "q=x=y"].map(String::from);
        let (scripts, params) = split_run_args(&args);
        assert_eq!(scripts, vec!["a.req".to_string(), "b".to_string()]);
        assert_eq!(params, vec!["id=7".to_string(), "q=x=y".to_string()]);
    }

    #[test]
    fn test_cli_parses_parallel_run() {
        let cli = Cli::try_parse_from(["restscript-auto", "run", "a.req", "b.req", "--parallel"]).unwrap();
        match cli.command {
            Command::Run { args, parallel, stop_on_error } => {
                assert_eq!(args, vec!["a.req".to_string(), "b.req".to_string()]);
                assert!(parallel);
                assert!(!stop_on_error);
            }
            _ => panic!("Expected Run command"),
        }
        assert!(Cli::try_parse_from(["restscript-auto", "run"]).is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer abc").unwrap(),
            ("Authorization".to_string(), "Bearer abc".to_string())
        );
        assert!(parse_header("broken").is_err());
    }

    #[test]
    fn test_cli_parses_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "restscript-auto",
            "suite",
            "nightly.yaml",
            "env=qa",
            "--continue-on-error",
            "-H",
            "X-Trace:1",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.headers, vec!["X-Trace:1".to_string()]);
        match cli.command {
            Command::Suite { params, continue_on_error, .. } => {
                assert_eq!(params, vec!["env=qa".to_string()]);
                assert!(continue_on_error);
            }
            _ => panic!("Expected Suite command"),
        }
    }
}
