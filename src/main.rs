use anyhow::Result;
use cli::Cli;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;

mod acquire;
mod classify;
mod cli;
mod config;
mod context;
mod convert;
mod error;
mod highlight;
mod merge;
mod render;

fn main() -> ExitCode {
    if let Err(e) = try_main() {
        eprintln!("{}: {e:#}", style("Error").red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    use clap::Parser;
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    // the context owns the temporary directory for the whole run and tears it
    // down on every exit path
    let ctx = context::RunContext::new()?;

    println!("Resolving source...");
    let tree = acquire::resolve(&cli.source, &ctx, cli.shallow_clone).map_err(|e| {
        error::FatalError::Acquisition {
            input: cli.source.clone(),
            reason: format!("{e:#}"),
        }
    })?;

    let mut config = config::IgnoreConfig::load(cli.ignore_file.as_deref(), &tree.root);
    if let Some(kb) = cli.max_size {
        config.max_file_size_kb = kb;
    }
    if let Some(n) = cli.batch_size {
        config.max_files_per_batch = n;
    }

    println!("Scanning {}...", tree.root.display());
    let records = classify::collect_files(&tree, &config)?;
    if records.is_empty() {
        return Err(error::FatalError::NoFilesIncluded.into());
    }
    println!("  {} file(s) to render", records.len());

    let converter = convert::ensure_converter()?;

    let mode = if cli.prettify {
        render::RenderMode::Prettify
    } else {
        render::RenderMode::Plain
    };
    let highlighter = highlight::Highlighter::new();

    let batches = merge::partition_batches(&records, config.max_files_per_batch);
    let jobs = cli
        .jobs
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .min(batches.len())
        .max(1);

    let progress = ProgressBar::new(records.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("can parse progress style")
            .progress_chars("#>-"),
    );
    progress.set_message("Rendering PDF...");

    let outcome = merge::render_batches(
        &tree,
        &batches,
        mode,
        &highlighter,
        &converter,
        &ctx,
        jobs,
        &progress,
    )?;
    progress.finish_and_clear();

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.pdf", tree.name)));
    merge::merge_documents(&outcome.partials, &output)?;

    let rendered: usize = outcome.partials.iter().map(|p| p.rendered_files).sum();
    let skipped: usize = outcome.partials.iter().map(|p| p.skipped_files.len()).sum();

    println!();
    println!("  Output PDF: {}", output.display());
    println!(
        "  Rendered:   {rendered} file(s) in {} batch(es)",
        outcome.partials.len()
    );
    if skipped > 0 || outcome.failed_batches > 0 {
        println!(
            "  {} {skipped} file(s) skipped, {} batch(es) failed (see log for details)",
            style("Warning:").yellow(),
            outcome.failed_batches
        );
    }

    Ok(())
}
