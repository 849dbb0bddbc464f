//! RNC lookup.
//!
//! Resolves a taxpayer ID against the published snapshot. Used by both the
//! `rncs lookup` CLI command and `GET /api/checkrnc/{rnc}`.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use crate::context::Context;
use crate::models::{ErrorBody, IndexedRecord};
use crate::store::{IndexStore, ReloadError};

/// Message served for unknown RNCs, on the CLI and over HTTP.
pub const NOT_FOUND_MESSAGE: &str = "This RNC does not exist";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("rnc not found: {0}")]
    NotFound(String),
    #[error("index unavailable: {0}")]
    Unavailable(Arc<ReloadError>),
}

/// Resolves `rnc` exactly as given; no trimming or case folding.
pub fn lookup(store: &IndexStore, rnc: &str) -> Result<IndexedRecord, LookupError> {
    store
        .get(rnc)
        .map_err(LookupError::Unavailable)?
        .ok_or_else(|| LookupError::NotFound(rnc.to_string()))
}

/// CLI entry point: prints the record as pretty JSON.
///
/// A miss prints the `{"error": ...}` envelope and exits with status 1.
pub async fn run_lookup(ctx: &Context, rnc: &str) -> Result<()> {
    ctx.acquirer().ensure(ctx.dataset_path()).await?;

    let store = ctx.store();
    let key = rnc.to_string();
    let outcome = tokio::task::spawn_blocking(move || lookup(&store, &key)).await?;

    match outcome {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(LookupError::NotFound(_)) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ErrorBody::new(NOT_FOUND_MESSAGE))?
            );
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
