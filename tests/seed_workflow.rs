//! Seed uploader against an in-memory bucket

mod harness;

use harness::FakeSeedBucket;
use std::path::Path;
use tempfile::TempDir;
use trustbucket::seed::{seed, UploadOutcome, METADATA_ORIGINAL_SIZE, METADATA_UPLOAD_TIMESTAMP};
use trustbucket::Error;
use trustbucket_config::SeedOptions;

fn options(dir: &Path) -> SeedOptions {
    SeedOptions {
        bucket_name: "demo-bucket".to_string(),
        region: "us-east-1".to_string(),
        seed_dir: dir.to_path_buf(),
    }
}

fn seed_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

#[tokio::test]
async fn uploads_every_file_with_type_and_metadata() {
    let dir = seed_dir(&[
        ("customers.csv", "id,name\n1,ada\n"),
        ("config.json", "{}"),
        ("blob.bin", "\x00\x01"),
    ]);
    let bucket = FakeSeedBucket::default();

    let report = seed(&options(dir.path()), &bucket).await.unwrap();

    assert_eq!(report.results.len(), 3);
    assert!(!report.has_failures());

    let puts = bucket.uploaded();
    let keys: Vec<_> = puts.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["blob.bin", "config.json", "customers.csv"]);

    let types: Vec<_> = puts.iter().map(|p| p.content_type.as_str()).collect();
    assert_eq!(
        types,
        ["application/octet-stream", "application/json", "text/csv"]
    );

    let csv = &puts[2];
    assert_eq!(csv.bucket, "demo-bucket");
    assert_eq!(csv.body, b"id,name\n1,ada\n");
    assert_eq!(csv.metadata[METADATA_ORIGINAL_SIZE], "14");
    assert!(chrono::DateTime::parse_from_rfc3339(&csv.metadata[METADATA_UPLOAD_TIMESTAMP]).is_ok());
}

#[tokio::test]
async fn failures_are_isolated_and_reported() {
    let dir = seed_dir(&[
        ("a.csv", "1"),
        ("b.csv", "2"),
        ("c.csv", "3"),
        ("d.csv", "4"),
    ]);
    let bucket = FakeSeedBucket::failing(&["b.csv", "d.csv"]);

    let report = seed(&options(dir.path()), &bucket).await.unwrap();

    assert_eq!(report.results.len(), 4);
    assert!(report.has_failures());
    let failed: Vec<_> = report.failed().map(|r| r.file_name.as_str()).collect();
    assert_eq!(failed, ["b.csv", "d.csv"]);
    for result in report.failed() {
        match &result.outcome {
            UploadOutcome::Failed { error } => assert!(error.contains("simulated failure")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    let etags: Vec<_> = report
        .succeeded()
        .map(|r| match &r.outcome {
            UploadOutcome::Uploaded { etag } => etag.clone().unwrap(),
            other => panic!("unexpected outcome: {other:?}"),
        })
        .collect();
    assert_eq!(etags, ["\"etag-a.csv\"", "\"etag-c.csv\""]);
}

#[tokio::test]
async fn empty_directory_uploads_nothing() {
    let dir = TempDir::new().unwrap();
    let bucket = FakeSeedBucket::default();

    let report = seed(&options(dir.path()), &bucket).await.unwrap();

    assert!(report.results.is_empty());
    assert!(!report.has_failures());
}

#[tokio::test]
async fn missing_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let bucket = FakeSeedBucket::default();

    let err = seed(&options(&dir.path().join("nope")), &bucket)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert!(bucket.uploaded().is_empty());
}

#[tokio::test]
async fn unusable_bucket_stops_before_uploading() {
    let dir = seed_dir(&[("a.csv", "1")]);
    let bucket = FakeSeedBucket::default();
    *bucket.probe_error.lock().unwrap() = Some(Error::BucketNotFound {
        bucket: "demo-bucket".to_string(),
    });

    let err = seed(&options(dir.path()), &bucket).await.unwrap_err();

    assert!(matches!(err, Error::BucketNotFound { .. }));
    assert!(bucket.uploaded().is_empty());
}
