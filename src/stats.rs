//! Dataset and index overview.
//!
//! Prints the local dataset location and size together with the record
//! count and build time of a freshly built snapshot. Used by `rncs stats` to
//! check that a download produced something servable.

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::context::Context;

/// Run the stats command: build the index and print a summary.
pub async fn run_stats(ctx: &Context) -> Result<()> {
    ctx.acquirer().ensure(ctx.dataset_path()).await?;

    let size = dataset_size(ctx.dataset_path())?;

    let store = ctx.store();
    let snapshot = tokio::task::spawn_blocking(move || store.ensure_built())
        .await?
        .map_err(|e| anyhow::anyhow!("could not build index: {}", e))?;

    println!("RNC index stats");
    println!("===============");
    println!();
    println!("  Dataset:     {}", ctx.dataset_path().display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Source:      {}", ctx.acquirer().url());
    println!();
    println!("  Records:     {}", snapshot.len());
    println!(
        "  Built at:    {}",
        snapshot.built_at().format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

fn dataset_size(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("failed to read metadata of {}", path.display()))?;
    Ok(meta.len())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
