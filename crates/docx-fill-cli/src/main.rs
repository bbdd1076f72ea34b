mod batch;
mod config;
mod keywords;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use batch::FillPlan;
use config::{Cli, Command, FillArgs, KeysArgs};
use keywords::KeywordFile;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Fill(args) => fill(&args),
        Command::Keys(args) => keys(&args),
    }
}

fn fill(args: &FillArgs) -> Result<()> {
    let keywords = KeywordFile::load(&args.keywords)?;
    let plan = FillPlan {
        values: keywords.values(),
        known_keys: keywords.known_keys(),
        options: args.apply_to(keywords.options()),
        dry_run: args.dry_run,
    };
    info!(
        "Project {}: {} enabled keyword(s), ledger in {:?}",
        keywords.project_name,
        plan.values.len(),
        plan.options.ledger_backend
    );

    let summary = batch::run(&args.input, &args.output, &plan)?;
    for outcome in &summary.outcomes {
        let status = match &outcome.result {
            Ok(report) if report.key_errors.is_empty() => "ok",
            Ok(_) => "partial",
            Err(_) => "failed",
        };
        println!("{}\t{}\t{}", status, outcome.input.display(), outcome.output.display());
    }
    info!(
        "Done: {} succeeded, {} failed{}",
        summary.succeeded(),
        summary.failed(),
        if args.dry_run { " (dry run)" } else { "" }
    );
    if summary.failed() > 0 {
        bail!("{} of {} document(s) failed", summary.failed(), summary.outcomes.len());
    }
    Ok(())
}

fn keys(args: &KeysArgs) -> Result<()> {
    let bytes = std::fs::read(&args.document)
        .with_context(|| format!("Failed to read {}", args.document.display()))?;
    let ledger = docx_fill_core::inspect(&bytes, args.ledger.into())
        .with_context(|| format!("Failed to read the ledger of {}", args.document.display()))?;

    if args.json {
        let entries: Vec<_> = ledger.entries().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if ledger.is_empty() {
        info!("{} tracks no keys", args.document.display());
    }
    for entry in ledger.entries() {
        println!(
            "{}\tv{}\t{}\t{}",
            entry.key,
            entry.version,
            entry.last_modified.to_rfc3339(),
            entry.current_value
        );
    }
    Ok(())
}
