//! Arevel command line
//!
//! Reads a view snapshot `{"body": [cells]}` and writes either the
//! evaluation response as JSON or the generated code. With `--lines` every
//! input line is a separate request and gets one response line.
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).

use arevel::{Arevel, EvalRequest};
use clap::{Parser, ValueEnum};
use serde_json::json;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Evaluate and print per-cell results
    #[default]
    Eval,
    /// JavaScript for an external host
    Js,
    /// Tree program run by the built-in machine
    Tree,
}

#[derive(Debug, Parser)]
#[command(name = "arevel", version, about = "Evaluate or compile Arevel cells.")]
struct Args {
    /// Request file. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// What to write to stdout.
    #[arg(long, value_enum, default_value_t = Emit::Eval)]
    emit: Emit,

    /// Significant digits for fractional powers.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    precision: Option<u32>,

    /// Longest stream a range may generate.
    #[arg(long, value_name = "N")]
    max_stream_len: Option<usize>,

    /// Treat every input line as its own request.
    #[arg(long)]
    lines: bool,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write output: {0}")]
    Write(#[source] io::Error),

    #[error("invalid request: {0}")]
    Request(#[source] serde_json::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn engine(args: &Args) -> Arevel {
    let mut arevel = Arevel::new();
    if let Some(precision) = args.precision {
        arevel = arevel.with_precision(precision);
    }
    if let Some(limit) = args.max_stream_len {
        arevel = arevel.with_max_stream_len(limit);
    }
    arevel
}

/// Output for one request
fn respond(arevel: &Arevel, args: &Args, text: &str) -> Result<String, CliError> {
    let request: EvalRequest = serde_json::from_str(text).map_err(CliError::Request)?;
    debug!(cells = request.body.len(), emit = ?args.emit, "request received");

    match args.emit {
        Emit::Js => Ok(arevel.compile_js(&request)),
        Emit::Tree => Ok(arevel.compile_tree(&request).to_string()),
        Emit::Eval => {
            let response = arevel.eval(&request);
            let encoded = if args.pretty {
                serde_json::to_string_pretty(&response)
            } else {
                serde_json::to_string(&response)
            };
            encoded.map_err(CliError::Encode)
        }
    }
}

fn read_input(args: &Args) -> Result<String, CliError> {
    match &args.input {
        Some(path) => fs::read_to_string(path).map_err(CliError::Read),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).map_err(CliError::Read)?;
            Ok(text)
        }
    }
}

fn run_once(arevel: &Arevel, args: &Args, out: &mut impl Write) -> Result<(), CliError> {
    let text = read_input(args)?;
    let output = respond(arevel, args, &text)?;
    writeln!(out, "{}", output.trim_end()).map_err(CliError::Write)?;
    out.flush().map_err(CliError::Write)
}

/// One response line per request line. A bad line gets an error object and
/// the loop continues.
fn run_lines(arevel: &Arevel, args: &Args, input: impl BufRead, out: &mut impl Write) -> Result<(), CliError> {
    let mut served = 0usize;
    for line in input.lines() {
        let line = line.map_err(CliError::Read)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let output = match respond(arevel, args, line) {
            Ok(output) => output,
            Err(err @ CliError::Request(_)) => {
                warn!(error = %err, "skipping request");
                json!({ "error": err.to_string() }).to_string()
            }
            Err(err) => return Err(err),
        };
        writeln!(out, "{}", output.trim_end()).map_err(CliError::Write)?;
        out.flush().map_err(CliError::Write)?;
        served += 1;
    }
    info!(requests = served, "input closed");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    let arevel = engine(&args);
    let mut stdout = io::stdout().lock();

    let result = if args.lines {
        match &args.input {
            Some(path) => fs::File::open(path)
                .map_err(CliError::Read)
                .and_then(|file| run_lines(&arevel, &args, io::BufReader::new(file), &mut stdout)),
            None => run_lines(&arevel, &args, io::stdin().lock(), &mut stdout),
        }
    } else {
        run_once(&arevel, &args, &mut stdout)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "arevel failed");
            ExitCode::FAILURE
        }
    }
}
