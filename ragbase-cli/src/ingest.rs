//! `ragbase ingest`: load files, then chunk, embed and index them.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ragbase_rag::{
    ConflictPolicy, Document, IngestionFailure, IngestionReport, RagConfig, RagError,
    discover_documents,
};
use tracing::warn;

use crate::cli::{IngestArgs, ModelArgs};
use crate::providers;

pub async fn run(args: IngestArgs, store_dir: &Path, models: &ModelArgs) -> Result<()> {
    let namespace = args.target.resolve()?;
    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .conflict_policy(if args.replace { ConflictPolicy::Replace } else { ConflictPolicy::Skip })
        .build()?;

    let LoadedDocuments { documents, failures: unreadable } = load_documents(&args.paths).await?;
    if documents.is_empty() {
        let mut stderr = std::io::stderr().lock();
        for failure in &unreadable {
            print_failure(failure, &mut stderr)?;
        }
        bail!("no ingestible documents found under the given paths");
    }

    let pipeline = providers::pipeline(store_dir, providers::embedder(models)?, config).await?;
    let mut report = pipeline.ingest(&documents, Some(&namespace)).await?;
    report.failures.splice(0..0, unreadable);

    print_report(&report, &mut std::io::stdout().lock())?;
    if report.is_complete_failure() {
        bail!("none of the {} document(s) could be ingested", report.failures.len());
    }
    Ok(())
}

/// Files read from disk, plus the ones that could not be read.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<Document>,
    pub failures: Vec<IngestionFailure>,
}

/// Expand directories and read every file. Unreadable files become
/// failures so they show up in the printed report.
pub async fn load_documents(paths: &[PathBuf]) -> Result<LoadedDocuments> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                discover_documents(path)
                    .with_context(|| format!("cannot scan {}", path.display()))?,
            );
        } else {
            files.push(path.clone());
        }
    }

    let mut loaded = LoadedDocuments::default();
    for file in files {
        match Document::from_path(&file).await {
            Ok(document) => loaded.documents.push(document),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "skipping unreadable file");
                let message = match e {
                    RagError::IngestionError { message, .. } => message,
                    other => other.to_string(),
                };
                loaded
                    .failures
                    .push(IngestionFailure { source_ref: file.display().to_string(), message });
            }
        }
    }
    Ok(loaded)
}

pub fn print_report(report: &IngestionReport, out: &mut impl Write) -> std::io::Result<()> {
    let stats = report.stats();
    writeln!(
        out,
        "Indexed {} document(s) into `{}`: {} chunk(s), {} new, {} replaced, {} unchanged",
        report.documents.len(),
        report.handle.namespace(),
        report.total_chunks(),
        stats.inserted,
        stats.replaced,
        stats.skipped,
    )?;
    for document in &report.documents {
        writeln!(out, "  {} ({} chunks)", document.source_ref, document.chunk_count)?;
    }
    for failure in &report.failures {
        print_failure(failure, out)?;
    }
    Ok(())
}

fn print_failure(failure: &IngestionFailure, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "  failed {}: {}", failure.source_ref, failure.message)
}
