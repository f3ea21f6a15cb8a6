//! Writes the service's OpenAPI document, or verifies that a committed copy is current.

use anyhow::{Context, bail};
use clap::Parser;
use parley_api::router::openapi_json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "openapi")]
#[command(about = "Generate the Parley API OpenAPI document")]
struct Args {
    /// Where the document is written (or read from with --check)
    #[arg(short, long, default_value = "openapi.json")]
    output: PathBuf,

    /// Fail instead of writing when the file differs from the generated document
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let document = openapi_json().context("Failed to render OpenAPI document")?;

    if args.check {
        let existing = std::fs::read_to_string(&args.output)
            .with_context(|| format!("Failed to read {}", args.output.display()))?;
        if existing.trim_end() != document.trim_end() {
            bail!(
                "{} is out of date; rerun without --check to regenerate it",
                args.output.display()
            );
        }
        println!("{} is up to date", args.output.display());
        return Ok(());
    }

    std::fs::write(&args.output, document)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Wrote {}", args.output.display());
    Ok(())
}
