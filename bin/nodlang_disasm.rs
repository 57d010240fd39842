use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nodlang::Code;

#[derive(Parser, Debug)]
#[command(name = "nodlang_disasm", about = "Print the listing of a nodlang bytecode file")]
struct Args {
    /// Bytecode file written by `nodlang compile`.
    path: PathBuf,

    /// Dump the decoded program as JSON instead of a listing.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let data = fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let code = Code::decode(&data[..]).with_context(|| format!("decoding {}", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&code)?);
        return Ok(());
    }

    println!("program: {} instructions", code.len());
    print!("{code}");
    Ok(())
}
