//! `structo check` command.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use structo::Schema;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema document to check
    pub file: PathBuf,
}

pub fn cmd_check(args: &CheckArgs) -> Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parse {}", args.file.display()))?;

    match Schema::from_value(&document) {
        Ok(schema) => {
            println!("{}: ok ({})", args.file.display(), summarize(&schema));
            Ok(())
        }
        Err(error) => bail!("{}: {}", args.file.display(), error),
    }
}

fn summarize(schema: &Schema) -> String {
    if let Some(reference) = &schema.reference {
        return format!("ref {reference}");
    }
    if let Some(schema_type) = &schema.schema_type {
        let mut summary = schema_type.to_string();
        if let Some(properties) = &schema.properties {
            summary.push_str(&format!(", {} properties", properties.len()));
        }
        return summary;
    }
    if let Some(values) = &schema.enum_values {
        return format!("enum of {} values", values.len());
    }
    if let Some(alternatives) = &schema.any_of {
        return format!("anyOf with {} alternatives", alternatives.len());
    }
    "empty".to_string()
}
