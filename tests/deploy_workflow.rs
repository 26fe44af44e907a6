//! Deploy workflow against in-memory fakes

mod harness;

use harness::{clients, sample_outputs, CallLog, FakeStacks, FakeVersionedBucket};
use std::path::Path;
use tempfile::TempDir;
use trustbucket::cloud::UpdateOutcome;
use trustbucket::deploy::deploy;
use trustbucket::{Error, MemoryOutputsStore, OutputsStore, StackOperation};
use trustbucket_config::{ConfigError, DeployOptions, OutputsRecord, StackOutput};

/// Reads as empty, refuses every write
struct ReadOnlyStore;

impl OutputsStore for ReadOnlyStore {
    fn read(&self) -> trustbucket::Result<OutputsRecord> {
        Ok(OutputsRecord::default())
    }

    fn write(&self, _outputs: &[StackOutput]) -> trustbucket::Result<()> {
        Err(Error::Io {
            action: "Failed to write",
            path: "outputs.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn remove(&self) -> trustbucket::Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "read-only".to_string()
    }
}

fn options(template: &Path) -> DeployOptions {
    DeployOptions {
        stack_name: "demo-stack".to_string(),
        template_file: template.to_path_buf(),
        region: "us-east-1".to_string(),
        bucket_name: "demo-bucket".to_string(),
        trust_account_one: "111111111111".to_string(),
        trust_account_two: "222222222222".to_string(),
    }
}

fn template() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stack.yaml");
    std::fs::write(&path, "AWSTemplateFormatVersion: '2010-09-09'\n").unwrap();
    (dir, path)
}

fn empty_bucket(log: &CallLog) -> FakeVersionedBucket {
    FakeVersionedBucket {
        log: log.clone(),
        listing: None,
        fail_delete_key: None,
    }
}

#[tokio::test]
async fn missing_trust_accounts_fail_before_any_call() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let clients = clients(
        FakeStacks::new(log.clone()),
        empty_bucket(&log),
        log.clone(),
    );
    let store = MemoryOutputsStore::new();

    let mut opts = options(&path);
    opts.trust_account_one.clear();
    opts.trust_account_two.clear();

    let err = deploy(&opts, &clients, &store).await.unwrap_err();
    match err {
        Error::Config(ConfigError::MissingTrustAccounts { missing }) => {
            assert_eq!(missing, ["TRUST_ACCOUNT_ONE", "TRUST_ACCOUNT_TWO"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(log.is_empty(), "unexpected calls: {:?}", log.calls());
    assert!(store.contents().is_none());
}

#[tokio::test]
async fn invalid_bucket_name_fails_before_any_call() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let clients = clients(
        FakeStacks::new(log.clone()),
        empty_bucket(&log),
        log.clone(),
    );
    let mut opts = options(&path);
    opts.bucket_name = "Not_A_Bucket".to_string();

    let err = deploy(&opts, &clients, &MemoryOutputsStore::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidBucketName { .. })
    ));
    assert!(log.is_empty());
}

#[tokio::test]
async fn new_stack_is_created_waited_and_recorded() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let mut stacks = FakeStacks::new(log.clone());
    stacks.outputs = sample_outputs();
    let clients = clients(stacks, empty_bucket(&log), log.clone());
    let store = MemoryOutputsStore::new();

    let report = deploy(&options(&path), &clients, &store).await.unwrap();

    assert_eq!(report.operation, StackOperation::Create);
    assert!(report.changed);
    assert_eq!(
        log.calls(),
        [
            "caller_identity",
            "stack_exists demo-stack",
            "create_stack demo-stack",
            "wait_for demo-stack create",
            "describe_outputs demo-stack",
        ]
    );
    let record = store.read().unwrap();
    assert_eq!(record.get("BucketName"), Some("demo-bucket"));
    assert_eq!(record.get("RoleArn"), Some("arn:aws:iam::999999999999:role/demo"));
}

#[tokio::test]
async fn existing_stack_is_updated() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let mut stacks = FakeStacks::new(log.clone());
    stacks.exists = true;
    stacks.outputs = sample_outputs();
    let clients = clients(stacks, empty_bucket(&log), log.clone());

    let report = deploy(&options(&path), &clients, &MemoryOutputsStore::new())
        .await
        .unwrap();

    assert_eq!(report.operation, StackOperation::Update);
    assert!(report.changed);
    assert_eq!(log.count("create_stack"), 0);
    assert_eq!(log.count("wait_for demo-stack update"), 1);
}

#[tokio::test]
async fn no_op_update_skips_wait_but_persists_outputs() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let mut stacks = FakeStacks::new(log.clone());
    stacks.exists = true;
    stacks.update = UpdateOutcome::NoChanges;
    stacks.outputs = sample_outputs();
    let clients = clients(stacks, empty_bucket(&log), log.clone());
    let store = MemoryOutputsStore::new();

    let report = deploy(&options(&path), &clients, &store).await.unwrap();

    assert!(!report.changed);
    assert_eq!(log.count("wait_for"), 0);
    assert_eq!(log.count("describe_outputs"), 1);
    assert_eq!(store.read().unwrap().len(), sample_outputs().len());
}

#[tokio::test]
async fn failed_wait_leaves_record_untouched() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let mut stacks = FakeStacks::new(log.clone());
    stacks.fail_wait = true;
    let clients = clients(stacks, empty_bucket(&log), log.clone());
    let store = MemoryOutputsStore::with_outputs(&sample_outputs()).unwrap();
    let before = store.contents();

    let err = deploy(&options(&path), &clients, &store).await.unwrap_err();

    assert!(matches!(err, Error::StackFailed { .. }));
    assert_eq!(log.count("describe_outputs"), 0);
    assert_eq!(store.contents(), before);
}

#[tokio::test]
async fn missing_template_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::default();
    let clients = clients(
        FakeStacks::new(log.clone()),
        empty_bucket(&log),
        log.clone(),
    );

    let err = deploy(
        &options(&dir.path().join("absent.yaml")),
        &clients,
        &MemoryOutputsStore::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert!(log.is_empty());
}

#[tokio::test]
async fn failed_outputs_write_after_deploy_is_fatal() {
    let (_dir, path) = template();
    let log = CallLog::default();
    let mut stacks = FakeStacks::new(log.clone());
    stacks.outputs = sample_outputs();
    let clients = clients(stacks, empty_bucket(&log), log.clone());

    let err = deploy(&options(&path), &clients, &ReadOnlyStore)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert!(err.to_string().contains("read-only"));
    assert_eq!(
        log.calls(),
        [
            "caller_identity",
            "stack_exists demo-stack",
            "create_stack demo-stack",
            "wait_for demo-stack create",
            "describe_outputs demo-stack",
        ]
    );
}

#[tokio::test]
async fn directory_as_outputs_path_fails_after_deploy() {
    let (dir, path) = template();
    let log = CallLog::default();
    let mut stacks = FakeStacks::new(log.clone());
    stacks.outputs = sample_outputs();
    let clients = clients(stacks, empty_bucket(&log), log.clone());
    let store = trustbucket::FileOutputsStore::new(dir.path());

    let err = deploy(&options(&path), &clients, &store).await.unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(log.count("describe_outputs"), 1);
}
