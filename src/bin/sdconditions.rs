// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use sdconditions::{
    Analyzer, ConditionRewriter, PackageCache, ScanOptions, Scanner, TypeContext, DEFAULT_PACKAGE,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory scanned recursively for StructureDefinitions.
    root: PathBuf,

    /// Package providing the base types, `id` or `id#version`.
    #[arg(long, default_value = DEFAULT_PACKAGE)]
    package: String,

    /// Unpacked package directories to load instead of the package cache.
    #[arg(long, value_name = "DIR")]
    package_dir: Vec<PathBuf>,

    /// Package cache location. Defaults to ~/.fhir/packages.
    #[arg(long, value_name = "DIR")]
    packages_root: Option<PathBuf>,

    /// Worker threads. Defaults to one per CPU.
    #[arg(long, short)]
    workers: Option<usize>,

    /// Report changes without writing them.
    #[arg(long)]
    dry_run: bool,
}

fn load_context(cli: &Cli) -> Result<TypeContext> {
    if !cli.package_dir.is_empty() {
        let mut context = TypeContext::new();
        for dir in &cli.package_dir {
            context
                .add_package_dir(dir)
                .with_context(|| format!("Failed to load {}", dir.display()))?;
        }
        return Ok(context);
    }

    let cache = match &cli.packages_root {
        Some(root) => PackageCache::new(root.clone()),
        None => PackageCache::user_default()?,
    };
    info!("loading {} from {}", cli.package, cache.root().display());
    Ok(cache.load(&cli.package)?)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let context = load_context(&cli)?;
    info!("loaded {} type definitions", context.len());

    let analyzer = Analyzer::new(Arc::new(context))?;
    let options = ScanOptions {
        workers: cli.workers.unwrap_or(0),
        dry_run: cli.dry_run,
        ..ScanOptions::default()
    };
    let scanner = Scanner::new(ConditionRewriter::new(analyzer), options);
    let summary = scanner
        .scan(&cli.root)
        .with_context(|| format!("Failed to scan {}", cli.root.display()))?;

    info!(
        "{} files, {} definitions, {} changed, {} written, {} failed",
        summary.files, summary.definitions, summary.changed, summary.written, summary.failed
    );
    Ok(())
}
