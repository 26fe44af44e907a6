//! `trustbucket seed`: upload sample files into the bucket
//!
//! Uploads run one at a time and a failed file never stops the batch. The
//! command fails afterwards if any file did.

use crate::cloud::sdk::SdkBackend;
use crate::cloud::{PutObject, SeedBucket};
use crate::error::{Error, Result};
use crate::outputs::OutputsStore;
use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use clap::Args;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use trustbucket_config::{resolve_seed_options, EnvSource, SeedFlags, SeedOptions, Settings};

pub const METADATA_UPLOAD_TIMESTAMP: &str = "upload-timestamp";
pub const METADATA_ORIGINAL_SIZE: &str = "original-size";

#[derive(Args, Debug, Default)]
pub struct SeedArgs {
    /// Target bucket (defaults to BucketName in outputs.json)
    pub bucket: Option<String>,

    /// Directory holding the files to upload
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// A file queued for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFile {
    pub path: PathBuf,
    /// Object key; the bare file name
    pub file_name: String,
    pub size: u64,
}

/// Content type from the file extension, case-insensitive
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("tsv") => "text/tab-separated-values",
        Some("xml") => "application/xml",
        Some("parquet") => "application/vnd.apache.parquet",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}

/// Regular files directly inside `dir`, sorted by name
pub async fn enumerate_seed_files(dir: &Path) -> Result<Vec<SeedFile>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::io("Failed to read seed directory", dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io("Failed to read seed directory", dir, e))?
    {
        let path = entry.path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::io("Failed to stat", &path, e))?;
        if !metadata.is_file() {
            debug!(path = %path.display(), "Skipping non-file entry");
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "Skipping file with a non UTF-8 name");
            continue;
        };
        files.push(SeedFile {
            file_name: file_name.to_string(),
            size: metadata.len(),
            path,
        });
    }

    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { etag: Option<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub file_name: String,
    pub outcome: UploadOutcome,
}

/// One result per enumerated file, in upload order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub bucket: String,
    pub results: Vec<UploadResult>,
}

impl SeedReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UploadResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Uploaded { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

async fn upload_one(
    bucket: &dyn SeedBucket,
    bucket_name: &str,
    file: &SeedFile,
) -> Result<Option<String>> {
    let body = tokio::fs::read(&file.path)
        .await
        .map_err(|e| Error::io("Failed to read", &file.path, e))?;

    let metadata = HashMap::from([
        (
            METADATA_UPLOAD_TIMESTAMP.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (METADATA_ORIGINAL_SIZE.to_string(), body.len().to_string()),
    ]);

    bucket
        .put_object(PutObject {
            bucket: bucket_name.to_string(),
            key: file.file_name.clone(),
            content_type: content_type_for(&file.path).to_string(),
            body,
            metadata,
        })
        .await
}

/// Probe the bucket, then upload every file in the seed directory.
///
/// A missing directory or an unusable bucket fails the whole run; individual
/// upload failures are recorded in the report.
pub async fn seed(options: &SeedOptions, bucket: &dyn SeedBucket) -> Result<SeedReport> {
    let files = enumerate_seed_files(&options.seed_dir).await?;
    info!(
        dir = %options.seed_dir.display(),
        count = files.len(),
        "Found seed files"
    );

    bucket.probe(&options.bucket_name).await?;

    let mut report = SeedReport {
        bucket: options.bucket_name.clone(),
        results: Vec::with_capacity(files.len()),
    };
    for file in &files {
        let outcome = match upload_one(bucket, &options.bucket_name, file).await {
            Ok(etag) => {
                info!(key = %file.file_name, size = file.size, "Uploaded");
                UploadOutcome::Uploaded { etag }
            }
            Err(e) => {
                warn!(key = %file.file_name, error = %e, "Upload failed");
                UploadOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        report.results.push(UploadResult {
            file_name: file.file_name.clone(),
            outcome,
        });
    }

    Ok(report)
}

fn print_summary(report: &SeedReport) {
    let uploaded: Vec<_> = report.succeeded().collect();
    let failed: Vec<_> = report.failed().collect();

    println!();
    println!("Uploaded {} file(s) to {}:", uploaded.len(), report.bucket);
    for result in &uploaded {
        if let UploadOutcome::Uploaded { etag } = &result.outcome {
            println!(
                "  {} (ETag {})",
                result.file_name,
                etag.as_deref().unwrap_or("unknown")
            );
        }
    }
    if !failed.is_empty() {
        println!();
        println!("Failed {} file(s):", failed.len());
        for result in &failed {
            if let UploadOutcome::Failed { error } = &result.outcome {
                println!("  {}: {}", result.file_name, error);
            }
        }
    }
    println!();
}

pub async fn run<E: EnvSource>(
    args: SeedArgs,
    settings: &Settings,
    env: &E,
    store: &dyn OutputsStore,
) -> anyhow::Result<()> {
    let record = store
        .read()
        .with_context(|| format!("Failed to read outputs record {}", store.location()))?;
    let flags = SeedFlags {
        bucket_name: args.bucket,
        seed_dir: args.dir,
    };
    let options = resolve_seed_options(&flags, env, &record, settings)?;

    println!();
    println!(
        "trustbucket seed - {} -> s3://{} ({})",
        options.seed_dir.display(),
        options.bucket_name,
        options.region
    );

    let backend = SdkBackend::connect(&options.region).await;
    let report = seed(&options, &backend).await?;
    print_summary(&report);

    if report.has_failures() {
        bail!(
            "{} of {} upload(s) failed",
            report.failed().count(),
            report.results.len()
        );
    }
    Ok(())
}
