mod output;
mod script;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use output::OutputWriter;
use session::Session;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use ufs_core::{Config, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_FILE_SIZE, Engine};

/// UFS - run command scripts against an in-memory file store
#[derive(Parser, Debug)]
#[command(name = "ufs")]
#[command(about = "Run command scripts against an in-memory file store", long_about = None)]
#[command(version)]
struct Cli {
    /// Script to execute (reads stdin if omitted)
    script: Option<PathBuf>,

    /// Output results as JSON, one object per line
    #[arg(long)]
    json: bool,

    /// Block size in bytes (defaults to UFS_BLOCK_SIZE env var or 512)
    #[arg(long)]
    block_size: Option<usize>,

    /// Maximum file size in bytes, or "none" (defaults to UFS_MAX_FILE_SIZE env var or 100 MiB)
    #[arg(long)]
    max_file_size: Option<String>,

    /// Keep executing after a failing command
    #[arg(short, long)]
    keep_going: bool,

    /// Log engine activity to stderr (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

/// Totals for one script run.
#[derive(Debug, Default, PartialEq, Eq)]
struct RunSummary {
    succeeded: usize,
    failed: usize,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut output = OutputWriter::new(cli.json);
    match run(&cli, &mut output) {
        Ok(summary) if summary.failed == 0 => {}
        Ok(_) => std::process::exit(1),
        Err(err) => {
            output.write_error(None, &err);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ufs_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli, output: &mut OutputWriter) -> Result<RunSummary> {
    let config = resolve_config(
        cli.block_size,
        cli.max_file_size.as_deref(),
        |key| std::env::var(key).ok(),
    )?;
    tracing::debug!(?config, "starting session");
    let engine = Engine::with_config(config).context("Failed to create engine")?;
    let mut session = Session::new(engine);

    let summary = match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            run_script(BufReader::new(file), &mut session, output, cli.keep_going, false)?
        }
        None => {
            let interactive = !output.is_json() && atty::is(atty::Stream::Stdin);
            let stdin = io::stdin();
            run_script(stdin.lock(), &mut session, output, cli.keep_going, interactive)?
        }
    };

    let engine = session.engine();
    tracing::debug!(
        commands = session.executed(),
        files = engine.file_count(),
        blocks = engine.block_count(),
        open = engine.open_count(),
        "session finished"
    );
    Ok(summary)
}

/// Settings resolve as CLI flag > environment variable > default.
fn resolve_config(
    block_size: Option<usize>,
    max_file_size: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let block_size = match block_size {
        Some(size) => size,
        None => match env("UFS_BLOCK_SIZE") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("Invalid UFS_BLOCK_SIZE: {}", value))?,
            None => DEFAULT_BLOCK_SIZE,
        },
    };

    let max_file_size = match max_file_size
        .map(str::to_string)
        .or_else(|| env("UFS_MAX_FILE_SIZE"))
    {
        Some(value) => parse_size_limit(&value)?,
        None => Some(DEFAULT_MAX_FILE_SIZE),
    };

    let config = Config::default()
        .with_block_size(block_size)
        .with_max_file_size(max_file_size);
    config.validate()?;
    Ok(config)
}

fn parse_size_limit(value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let limit = value
        .parse()
        .with_context(|| format!("Invalid maximum file size: {}", value))?;
    Ok(Some(limit))
}

fn run_script<R: BufRead>(
    reader: R,
    session: &mut Session,
    output: &mut OutputWriter,
    keep_going: bool,
    interactive: bool,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    if interactive {
        output.prompt();
    }

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;

        let step = script::parse_line(&line)
            .with_context(|| format!("line {}: parse error", line_no))
            .and_then(|command| match command {
                Some(command) => session
                    .execute(&command)
                    .map(Some)
                    .with_context(|| format!("line {}: {}", line_no, line.trim())),
                None => Ok(None),
            });

        match step {
            Ok(Some(outcome)) => {
                output.write_outcome(line_no, &outcome)?;
                summary.succeeded += 1;
            }
            Ok(None) => {}
            Err(err) => {
                summary.failed += 1;
                output.write_error(Some(line_no), &err);
                if !keep_going && !interactive {
                    break;
                }
            }
        }

        if interactive {
            output.prompt();
        }
    }

    tracing::debug!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "script finished"
    );
    Ok(summary)
}
