use std::{cell::RefCell, path::PathBuf, process::ExitCode, rc::Rc};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(version, about = "Runs and checks programs in a small imperative language")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a program and exit with the result of main
    Run(FileArgs),
    /// Lex, parse and analyze a program without running it
    Check(FileArgs),
    /// Print the token stream
    Tokens(FileArgs),
    /// Print the analyzed syntax tree
    Ast(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Tokenize(#[from] plc::tokenizer::TokenizeError),
    #[error(transparent)]
    Pipeline(#[from] plc::Error),
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let result = match &args.command {
        Command::Run(args) => run_command(args),
        Command::Check(args) => check_command(args),
        Command::Tokens(args) => tokens_command(args),
        Command::Ast(args) => ast_command(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn read(args: &FileArgs) -> Result<String, CliError> {
    std::fs::read_to_string(&args.file).map_err(|source| CliError::Read {
        path: args.file.clone(),
        source,
    })
}

fn run_command(args: &FileArgs) -> Result<ExitCode, CliError> {
    let source = read(args)?;
    let result = plc::run(&source, Rc::new(RefCell::new(std::io::stdout())))?;
    tracing::debug!(result, "main returned");
    // Exit codes only carry the low byte.
    Ok(ExitCode::from(result.to_le_bytes()[0]))
}

fn check_command(args: &FileArgs) -> Result<ExitCode, CliError> {
    let source = read(args)?;
    plc::check(&source)?;
    println!("{}: ok", args.file.display());
    Ok(ExitCode::SUCCESS)
}

fn tokens_command(args: &FileArgs) -> Result<ExitCode, CliError> {
    let source = read(args)?;
    for token in plc::tokenizer::tokens(&source)? {
        println!("{:5} {:<10} {}", token.index, token.kind.to_string(), token.literal);
    }
    Ok(ExitCode::SUCCESS)
}

fn ast_command(args: &FileArgs) -> Result<ExitCode, CliError> {
    let source = read(args)?;
    println!("{}", plc::check(&source)?);
    Ok(ExitCode::SUCCESS)
}
