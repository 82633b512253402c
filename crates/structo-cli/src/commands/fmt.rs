//! `structo fmt` command.
//!
//! Normalization is the decode/encode round trip: unknown keys are dropped
//! and a `$ref` node is reduced to the reference alone.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use structo::Schema;

#[derive(Args, Debug)]
pub struct FmtArgs {
    /// Schema document to normalize
    pub file: PathBuf,

    /// Rewrite the file in place instead of printing
    #[arg(long)]
    pub write: bool,
}

pub fn cmd_fmt(args: &FmtArgs) -> Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parse {}", args.file.display()))?;

    let schema = Schema::from_value(&document)
        .with_context(|| format!("decode {}", args.file.display()))?;
    let normalized = serde_json::to_string_pretty(&schema).context("encode schema")?;

    if args.write {
        fs::write(&args.file, format!("{normalized}\n"))
            .with_context(|| format!("write {}", args.file.display()))?;
    } else {
        println!("{normalized}");
    }
    Ok(())
}
