use std::{
    io::Read as _,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use movingimages::{CommandBatch, Context, ContextConfig, Reply};

#[derive(Parser, Debug)]
#[command(name = "movingimages", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a command batch and print its reply as JSON.
    Run(RunArgs),
    /// Check a command batch without running it.
    Validate(ValidateArgs),
    /// Print the engine version reported by the `version` property.
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Batch JSON file, or `-` for stdin.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Bind a variable before the batch runs. Values parse as JSON, falling back to a string.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, Value)>,

    /// Context config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run through the asynchronous path regardless of `runasynchronously`.
    #[arg(long = "async")]
    run_async: bool,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Batch JSON file, or `-` for stdin.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Context config JSON; only `max_draw_depth` matters here.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("MOVINGIMAGES_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let reply = match cli.cmd {
        Command::Run(args) => cmd_run(args)?,
        Command::Validate(args) => cmd_validate(args)?,
        Command::Version => {
            println!("{}", movingimages::VERSION);
            return Ok(());
        }
    };
    println!("{}", serde_json::to_string_pretty(&reply.to_json())?);
    if !reply.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_var(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err("variable name is empty".to_owned());
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((key.to_owned(), value))
}

fn read_batch(path: &Path) -> anyhow::Result<CommandBatch> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read batch from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("open batch '{}'", path.display()))?
    };
    Ok(CommandBatch::from_json_str(&text).with_context(|| format!("parse batch '{}'", path.display()))?)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ContextConfig> {
    Ok(match path {
        Some(p) => ContextConfig::load(p)?,
        None => ContextConfig::default(),
    })
}

fn cmd_run(args: RunArgs) -> anyhow::Result<Reply> {
    let mut batch = read_batch(&args.in_path)?;
    batch.variables.extend(args.vars);
    batch.run_asynchronously |= args.run_async;

    let ctx = Context::with_config(load_config(args.config.as_deref())?);
    tracing::info!(commands = batch.commands.len(), "running batch");
    Ok(movingimages::run_batch_shared(&Arc::new(Mutex::new(ctx)), batch))
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<Reply> {
    let batch = read_batch(&args.in_path)?;
    let config = load_config(args.config.as_deref())?;
    Ok(movingimages::validate_batch(&batch, config.max_draw_depth))
}
