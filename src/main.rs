//! # Conflake
//!
//! The compiler driver: lexes, parses and analyzes the given source file,
//! then JIT-compiles it and prints the evaluated result of its trailing
//! expression.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use log::info;

use conflake::{codegen, lexer::Lexer, parser, typechecker};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the Conflake source file to compile and run.
    #[arg(short, long)]
    file: PathBuf,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,

    /// Log the token stream after lexing.
    #[arg(long)]
    dump_tokens: bool,

    /// Log the parsed top level units.
    #[arg(long)]
    dump_ast: bool,

    /// Log the generated IR module.
    #[arg(long)]
    dump_ir: bool,
}

/// Enum for specifying the log level of the compiler.
#[derive(ValueEnum, Clone, Copy, Default, Debug)]
enum LogLevel {
    /// Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// Also log warnings.
    #[value(alias("1"))]
    Warn,

    /// Log information about the general state of the compiler, including
    /// the artifacts requested by the --dump-* flags.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the compiler.
    #[value(alias("3"))]
    Debug,
}

impl From<LogLevel> for log::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();

    simple_logger::init_with_level(args.verbosity.into()).unwrap();

    run(&args)
}

/// Runs the pipeline, reporting the first failing stage as a single
/// prefixed line on stdout.
fn run(args: &Cli) -> ExitCode {
    let tokens = match Lexer::from_path(&args.file) {
        Ok(tokens) => tokens,
        Err(e) => {
            println!("Lexer error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if args.dump_tokens {
        info!("tokens: {tokens:?}");
    }

    let top_level = match parser::parse(&tokens) {
        Ok(top_level) => top_level,
        Err(e) => {
            println!("Parser error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if args.dump_ast {
        let printed = top_level
            .iter()
            .map(|unit| unit.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        info!("parsed:\n{printed}");
    }

    let analyzed = match typechecker::analyze(&top_level) {
        Ok(analyzed) => analyzed,
        Err(e) => {
            println!("Semantic error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match codegen::run(&analyzed, args.dump_ir) {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
