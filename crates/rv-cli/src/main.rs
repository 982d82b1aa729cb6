// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rv_cli::commands::{self, RunOptions};
use rv_cli::format::{Formatter, OutputFormat};
use rv_dialect::ApiStyle;
use rv_verdict::CancellationFlag;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rv", version, about = "Cross-provider response differential verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run verification suites against the proxy.
    Run {
        /// Configuration file (defaults to RV_CONFIG, ~/.tingly-box/config.json, ./config.json).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Proxy base URL, overriding the configuration.
        #[arg(long)]
        server_url: Option<String>,

        /// Built-in suite to run: differential | compliance. Can be repeated.
        #[arg(long = "suite")]
        suites: Vec<String>,

        /// Scenario used by single-rule tests.
        #[arg(long)]
        scenario: Option<String>,

        /// JSON suite plan replacing the built-in suites.
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Prompt sent on every path.
        #[arg(long)]
        prompt: Option<String>,

        /// Output format: text | json | json-pretty | table | compact.
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Where to write the JSON report.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Load and validate a configuration file.
    CheckConfig {
        /// Configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a saved response body against a dialect's field checklist.
    Validate {
        /// Dialect of the body; detected from its shape when omitted.
        #[arg(long)]
        style: Option<String>,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// JSON file holding the response body.
        file: PathBuf,
    },

    /// List the models the proxy exposes.
    Models {
        /// Configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Proxy base URL, overriding the configuration.
        #[arg(long)]
        server_url: Option<String>,

        /// Front-end dialect to ask.
        #[arg(long, default_value = "openai")]
        style: String,

        /// Scenario namespace.
        #[arg(long)]
        scenario: Option<String>,
    },
}

impl Commands {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Self::Run { config, .. } | Self::CheckConfig { config } | Self::Models { config, .. } => {
                config.as_deref()
            }
            Self::Validate { .. } => None,
        }
    }
}

fn parse_style(raw: &str) -> Result<ApiStyle> {
    ApiStyle::parse(raw).with_context(|| format!("unknown API style '{raw}'"))
}

/// `rv=debug` with `--debug`, otherwise the configured log level.
fn log_filter(debug: bool, config: Option<&Path>) -> EnvFilter {
    if debug {
        return EnvFilter::new("rv=debug");
    }
    let level = rv_config::load_config(config)
        .ok()
        .and_then(|c| c.settings.log_level)
        .unwrap_or_else(|| "info".to_string());
    EnvFilter::try_new(format!("rv={level}")).unwrap_or_else(|_| EnvFilter::new("rv=info"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = log_filter(cli.debug, cli.command.config_path());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            config,
            server_url,
            suites,
            scenario,
            plan,
            prompt,
            format,
            out,
        } => {
            let opts = RunOptions {
                config,
                server_url,
                suites,
                scenario,
                plan,
                prompt,
            };
            cmd_run(opts, format, out).await
        }
        Commands::CheckConfig { config } => cmd_check_config(config.as_deref()),
        Commands::Validate {
            style,
            format,
            file,
        } => cmd_validate(style.as_deref(), format, &file),
        Commands::Models {
            config,
            server_url,
            style,
            scenario,
        } => {
            let style = parse_style(&style)?;
            let ids = commands::list_models(
                config.as_deref(),
                server_url.as_deref(),
                style,
                scenario.as_deref(),
            )
            .await?;
            for id in ids {
                println!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn cmd_run(opts: RunOptions, format: OutputFormat, out: Option<PathBuf>) -> Result<ExitCode> {
    let cancel = CancellationFlag::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, finishing tests in flight");
            watcher.cancel();
        }
    });

    let report = commands::run(&opts, cancel).await?;

    println!("{}", Formatter::new(format).format_report(&report));
    if format != OutputFormat::Text {
        eprintln!("{}", Formatter::new(OutputFormat::Compact).format_report(&report));
    }
    if let Some(path) = out {
        commands::write_report(&report, &path)?;
        eprintln!("report: {}", path.display());
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_check_config(config: Option<&Path>) -> Result<ExitCode> {
    let check = commands::check_config(config)?;
    match &check.source {
        Some(p) => println!("config: {}", p.display()),
        None => println!("config: <defaults>"),
    }
    println!("providers: {}", check.providers);
    println!("rules: {}", check.rules);
    println!("scenarios: {}", check.scenarios.join(", "));
    for w in &check.warnings {
        println!("warning: {w}");
    }
    println!("ok");
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(style: Option<&str>, format: OutputFormat, file: &Path) -> Result<ExitCode> {
    let style = style.map(parse_style).transpose()?;
    let report = commands::validate_body(file, style)?;
    if style.is_none() {
        eprintln!(
            "style: {} (detected from body shape, pass --style to override)",
            report.style.wire_name()
        );
    }
    println!("{}", Formatter::new(format).format_validation(&report));
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
