// SPDX-License-Identifier: MIT OR Apache-2.0
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Repo maintenance tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate JSON Schemas for the report, suite plan and settings types.
    Schema {
        /// Output directory.
        #[arg(long, default_value = "contracts/schemas")]
        out_dir: PathBuf,
    },
    /// List workspace crates with their versions.
    ListCrates {
        /// Workspace root; defaults to the parent of this crate.
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Schema { out_dir } => schema(out_dir),
        Command::ListCrates { root } => list_crates(root.unwrap_or_else(workspace_root)),
    }
}

fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

fn schema(out_dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&out_dir).context("create schema output dir")?;

    let report = rv_verdict::SuiteReport::schema();
    let plan = schema_for!(rv_verdict::SuitePlan);
    let thresholds = schema_for!(rv_verdict::ThresholdTable);
    let settings = schema_for!(rv_config::HarnessSettings);

    write_schema(&out_dir.join("suite_report.schema.json"), &report)?;
    write_schema(&out_dir.join("suite_plan.schema.json"), &plan)?;
    write_schema(&out_dir.join("thresholds.schema.json"), &thresholds)?;
    write_schema(&out_dir.join("harness_settings.schema.json"), &settings)?;

    eprintln!("wrote schemas to {}", out_dir.display());
    Ok(())
}

fn write_schema(path: &Path, schema: &schemars::Schema) -> Result<()> {
    let s = serde_json::to_string_pretty(schema)?;
    std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn list_crates(root: PathBuf) -> Result<()> {
    let crates_dir = root.join("crates");
    let mut rows = Vec::new();
    for entry in WalkDir::new(&crates_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("walk {}", crates_dir.display()))?;
        if entry.file_name() != "Cargo.toml" {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())
            .with_context(|| format!("read {}", entry.path().display()))?;
        let manifest: toml::Value = toml::from_str(&content)
            .with_context(|| format!("parse {}", entry.path().display()))?;
        let package = manifest.get("package");
        let field = |key: &str| {
            package
                .and_then(|p| p.get(key))
                .and_then(toml::Value::as_str)
                .unwrap_or("-")
                .to_string()
        };
        rows.push((field("name"), field("description")));
    }

    let width = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, description) in &rows {
        println!("{name:<width$}  {description}");
    }
    println!("{} crates", rows.len());
    Ok(())
}
