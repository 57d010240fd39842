//=====================================================
// File: main.rs
//=====================================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Nodlang CLI entry point
// Objective: Run, reformat, compile, list and step through nodlang source
//            files from the command line
//=====================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use nodlang::{EngineConfig, Session};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nodlang", about = "Nodlang language engine")]
pub struct Args {
    /// Refuse identifiers that were never declared.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse, compile and run a source file, then print the result.
    Run(SourceArgs),
    /// Parse a source file and print it back.
    Fmt(SourceArgs),
    /// Compile a source file into bytecode.
    Compile(CompileArgs),
    /// Print the compiled listing of a source file.
    Asm(SourceArgs),
    /// Run a source file one node at a time.
    Step(SourceArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SourceArgs {
    /// Input source file.
    pub input: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CompileArgs {
    /// Input source file.
    pub input: PathBuf,
    /// Output bytecode file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.strict_mode |= args.strict;
    install_tracing(&config.log_filter);

    let mut session = Session::new(config);
    match args.command {
        Command::Run(cmd) => run_file(&mut session, &cmd.input),
        Command::Fmt(cmd) => format_file(&mut session, &cmd.input),
        Command::Compile(cmd) => compile_file(&mut session, &cmd.input, &cmd.output),
        Command::Asm(cmd) => list_file(&mut session, &cmd.input),
        Command::Step(cmd) => step_file(&mut session, &cmd.input),
    }
}

/// `NODLANG_LOG` wins over the configured filter.
fn install_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_env("NODLANG_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn parse_file(session: &mut Session, path: &Path) -> Result<()> {
    let source = read_source(path)?;
    session
        .parse(&source)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(())
}

fn run_file(session: &mut Session, path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let result = session
        .eval(&source)
        .with_context(|| format!("running {}", path.display()))?;
    println!("{result}");
    Ok(())
}

fn format_file(session: &mut Session, path: &Path) -> Result<()> {
    parse_file(session, path)?;
    print!("{}", session.serialize()?);
    Ok(())
}

fn compile_file(session: &mut Session, input: &Path, output: &Path) -> Result<()> {
    parse_file(session, input)?;
    let code = session.compile()?;
    let bytes = code.serialize().context("encoding bytecode")?;
    fs::write(output, bytes).with_context(|| format!("writing {}", output.display()))?;
    println!("wrote {} instructions to {}", code.len(), output.display());
    Ok(())
}

fn list_file(session: &mut Session, path: &Path) -> Result<()> {
    parse_file(session, path)?;
    print!("{}", session.compile()?);
    Ok(())
}

fn step_file(session: &mut Session, path: &Path) -> Result<()> {
    parse_file(session, path)?;
    session.load()?;
    session.debug()?;
    while session.step_over()? {
        let line = session.vm().get_next_instruction().map(|i| i.line).unwrap_or_default();
        let name = session
            .vm()
            .next_node()
            .and_then(|id| session.graph().node(id).ok())
            .map(|node| node.name.clone())
            .unwrap_or_default();
        println!("{line:04}  {name:<24} rax = {}", session.vm().last_result());
    }
    println!("result: {}", session.vm().last_result());
    Ok(())
}
