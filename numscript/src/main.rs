//! numscript CLI

use clap::{Parser, Subcommand};
use numscript::{Interpreter, Settings};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "numscript", version, about = "numscript - numerical scripting language interpreter")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print each command read by the top-level loop before running it
    #[arg(long, global = true)]
    echo_commands: bool,

    /// Do not print the startup banner
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file
    Run {
        /// Script to run
        file: PathBuf,
        /// Keep reading commands after the file finishes
        #[arg(long)]
        persist: bool,
    },
    /// Evaluate code given on the command line
    Eval {
        /// Code to evaluate
        code: String,
    },
    /// Start the interactive prompt (the default)
    Repl,
    /// Parse and dump AST (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
}

fn main() {
    numscript::init_tracing();
    let cli = Cli::parse();
    // the interpreter is dropped inside run() so history is saved before exit
    let status = run(cli);
    std::process::exit(status);
}

fn run(cli: Cli) -> i32 {
    let settings = match &cli.config {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        },
        None => Settings::default(),
    };

    let command = cli.command.unwrap_or(Command::Repl);
    let make_interp = || {
        let mut interp = Interpreter::with_settings(settings.clone());
        interp.set_echo_commands(cli.echo_commands);
        interp
    };

    match command {
        Command::Run { file, persist } => {
            tracing::debug!(file = %file.display(), persist, "running file");
            let mut interp = make_interp();
            if persist {
                numscript::repl::attach_stdin(&mut interp, cli.quiet);
                interp.run_file_persistent(&file)
            } else {
                interp.run_file(&file)
            }
        }
        Command::Eval { code } => make_interp().run_string(&code),
        Command::Repl => numscript::repl::run(&mut make_interp(), cli.quiet),
        Command::Parse { file } => report(parse_file(&file)),
        Command::Tokens { file } => report(tokenize_file(&file)),
    }
}

fn report(result: Result<(), Box<dyn std::error::Error>>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let ast = match numscript::parser::parse_file(&source) {
        Ok(ast) => ast,
        Err(e) => {
            numscript::error::report_error(&filename, &source, &e);
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let tokens = match numscript::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            numscript::error::report_error(&filename, &source, &e);
            return Err(e.into());
        }
    };
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(())
}
