use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use termtape::config::{load_config, KeyFailurePolicy, RecorderConfig};
use termtape::error_codes::{envelope, exit_code};
use termtape::options::SessionOptions;
use termtape::tape::{load_tape, tokenize, Statement};

const DEFAULT_LOG_FILTER: &str = "termtape=info";

#[derive(Debug, Parser)]
#[command(name = "termtape")]
#[command(about = "Validate and inspect terminal recording tapes")]
#[command(version = env!("TERMTAPE_BUILD_VERSION"))]
struct Cli {
    /// Recorder config (YAML). Relative paths in it resolve against its directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Resolve the recorder config with key_failure: abort. This binary does
    /// not record; the policy is reported by `check --json` for the embedding
    /// recorder.
    #[arg(long, global = true)]
    abort_on_key_failure: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and validate a tape, resolve its options and check required programs.
    Check {
        tape: PathBuf,
        /// Print the resolved tape as JSON; errors become a JSON envelope on stderr.
        #[arg(long)]
        json: bool,
        /// Do not look up `Require`d programs on PATH.
        #[arg(long)]
        skip_requires: bool,
    },
    /// Print the tape's tokens, one JSON object per line.
    Lex { tape: PathBuf },
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    ok: bool,
    tape: &'a Path,
    statements: &'a [Statement],
    options: &'a SessionOptions,
    recorder: &'a RecorderConfig,
    programs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let json_errors = matches!(cli.command, Commands::Check { json: true, .. });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if json_errors {
                match serde_json::to_string(&envelope(&error)) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("error: {error:#}"),
                }
            } else {
                eprintln!("error: {error:#}");
            }
            ExitCode::from(exit_code(&error))
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check {
            tape,
            json,
            skip_requires,
        } => {
            let mut recorder = load_recorder_config(cli.config.as_deref(), &tape)?;
            if cli.abort_on_key_failure {
                recorder.key_failure = KeyFailurePolicy::Abort;
            }
            run_check(&tape, &recorder, json, skip_requires)
        }
        Commands::Lex { tape } => run_lex(&tape),
    }
}

fn load_recorder_config(config_path: Option<&Path>, tape_path: &Path) -> Result<RecorderConfig> {
    let base_dir = tape_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    load_config(config_path, &base_dir)
}

fn run_check(
    tape_path: &Path,
    recorder: &RecorderConfig,
    json: bool,
    skip_requires: bool,
) -> Result<()> {
    let tape = load_tape(tape_path)?;
    let options = SessionOptions::from_tape(&tape)
        .with_context(|| format!("invalid settings in {}", tape_path.display()))?;
    let programs = if skip_requires {
        Vec::new()
    } else {
        termtape::require::check_requirements(&options.requires)?
    };
    debug!(statements = tape.statements.len(), "tape checked");

    if json {
        let report = CheckReport {
            ok: true,
            tape: tape_path,
            statements: &tape.statements,
            options: &options,
            recorder,
            programs,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize check report")?
        );
        return Ok(());
    }

    println!(
        "OK: {} ({} statements, {} actions)",
        tape_path.display(),
        tape.statements.len(),
        tape.actions().count()
    );
    println!(
        "Capture: {} fps, {}x{}, start buffer {} frames, end buffer {} frames",
        options.framerate,
        options.width,
        options.height,
        options.start_buffer_frames(),
        options.end_buffer_frames()
    );
    for output in &options.outputs {
        println!("Output: {}", output.display());
    }
    for program in &programs {
        println!("Requires: {}", program.display());
    }
    println!("Frames dir: {}", recorder.frames_dir.display());
    Ok(())
}

fn run_lex(tape_path: &Path) -> Result<()> {
    let source = std::fs::read_to_string(tape_path)
        .with_context(|| format!("failed to read tape {}", tape_path.display()))?;
    let tokens = tokenize(&source)
        .with_context(|| format!("failed to tokenize {}", tape_path.display()))?;
    for token in &tokens {
        println!(
            "{}",
            serde_json::to_string(token).context("failed to serialize token")?
        );
    }
    Ok(())
}
