use std::{path::PathBuf, process::ExitCode, time::Instant};

use clap::Parser;
use sable::{
    driver::{compile_files, CompileOptions, EmitKind, SourceUnit},
    errors::errors::{CompileError, Error},
    render_error,
};
use tracing_subscriber::EnvFilter;

/// Ahead-of-time compiler for sable programs.
#[derive(Debug, Parser)]
#[command(name = "sable", version)]
struct Args {
    /// Source units. The first one is the entry unit.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(short, long, default_value = "out.ll")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = EmitKind::Ir)]
    emit: EmitKind,

    /// Optimization level
    #[arg(short = 'O', default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,

    /// Target triple, the host's when omitted
    #[arg(long)]
    target: Option<String>,
}

fn print_diagnostic(error: &Error, units: &[SourceUnit]) {
    let file = error.get_position().1.as_str();
    match units.iter().find(|unit| unit.file_name() == file) {
        Some(unit) => eprint!("{}", render_error(error, &unit.path, &unit.content)),
        None => eprintln!("Error: {}", error),
    }
}

fn report(error: &CompileError, units: &[SourceUnit]) {
    match error {
        CompileError::Lex(error) | CompileError::Parse(error) => print_diagnostic(error, units),
        CompileError::Semantic(errors) => {
            for error in errors {
                print_diagnostic(error, units);
            }
            eprintln!("{}", error);
        }
        other => eprintln!("error: {}", other),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("SABLE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = CompileOptions {
        output: args.output,
        emit: args.emit,
        opt_level: args.opt_level,
        target: args.target,
    };

    let start = Instant::now();

    match compile_files(&args.inputs, &options) {
        Ok(units) => {
            tracing::info!(units = units.len(), elapsed = ?start.elapsed(), "compiled");
            ExitCode::SUCCESS
        }
        Err((units, error)) => {
            report(&error, &units);
            ExitCode::FAILURE
        }
    }
}
