//! Typed access to CloudFormation, STS and S3
//!
//! Workflows only talk to the traits in this module. Two backends implement
//! them: [`sdk::SdkBackend`] (AWS SDK for Rust) and [`cli::CliBackend`]
//! (shells out to `aws`).

use crate::error::{Result, StackOperation};
use crate::runner::{CommandRunner, NO_UPDATES_MARKER};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use trustbucket_config::{Backend, StackOutput};

pub mod cli;
pub mod sdk;

/// Everything needed to create or update the stack
#[derive(Debug, Clone)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_path: PathBuf,
    pub template_body: String,
    pub parameters: Vec<(String, String)>,
}

/// Capability the template needs for its named IAM role
pub const STACK_CAPABILITY: &str = "CAPABILITY_NAMED_IAM";

/// Outcome of an update request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was accepted; wait for it to finish
    Started,
    /// Template and parameters are unchanged; nothing to wait for
    NoChanges,
}

#[async_trait::async_trait]
pub trait StackApi: Send + Sync {
    async fn stack_exists(&self, stack_name: &str) -> Result<bool>;

    async fn create_stack(&self, request: &StackRequest) -> Result<()>;

    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome>;

    /// Block until the operation reaches a terminal status
    async fn wait_for(&self, stack_name: &str, operation: StackOperation) -> Result<()>;

    async fn describe_outputs(&self, stack_name: &str) -> Result<Vec<StackOutput>>;

    async fn delete_stack(&self, stack_name: &str) -> Result<()>;
}

/// Who the configured credentials belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

#[async_trait::async_trait]
pub trait IdentityApi: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity>;
}

/// One object version or delete marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
}

/// Single listing of a versioned bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionListing {
    pub versions: Vec<ObjectVersion>,
    pub delete_markers: Vec<ObjectVersion>,
}

impl VersionListing {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.delete_markers.is_empty()
    }
}

/// Bucket operations needed to empty a versioned bucket
#[async_trait::async_trait]
pub trait VersionedBucket: Send + Sync {
    /// List every version and delete marker in one call
    async fn list_versions(&self, bucket: &str) -> Result<VersionListing>;

    async fn delete_version(&self, bucket: &str, entry: &ObjectVersion) -> Result<()>;
}

/// One object upload
#[derive(Debug, Clone)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Bucket operations needed to seed data
#[async_trait::async_trait]
pub trait SeedBucket: Send + Sync {
    /// Bounded listing to prove the bucket exists and is readable
    async fn probe(&self, bucket: &str) -> Result<()>;

    /// Upload an object, returning its entity tag
    async fn put_object(&self, request: PutObject) -> Result<Option<String>>;
}

/// Where a stack wait currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Pending,
    Complete,
    Failed,
}

/// Map a CloudFormation stack status onto the wait for `operation`
pub fn classify_status(operation: StackOperation, status: &str) -> WaitState {
    let target = match operation {
        StackOperation::Create => "CREATE_COMPLETE",
        StackOperation::Update => "UPDATE_COMPLETE",
        StackOperation::Delete => "DELETE_COMPLETE",
    };
    if status == target {
        WaitState::Complete
    } else if status.ends_with("_IN_PROGRESS") {
        WaitState::Pending
    } else {
        WaitState::Failed
    }
}

/// CloudFormation reports a no-op update as a `ValidationError` whose only
/// distinguishing feature is the message.
pub fn is_no_op_update(code: Option<&str>, message: Option<&str>) -> bool {
    matches!(code, Some("ValidationError") | None)
        && message.is_some_and(|m| m.contains(NO_UPDATES_MARKER))
}

/// Describing a missing stack is also a `ValidationError`
pub fn is_missing_stack(code: Option<&str>, message: Option<&str>) -> bool {
    matches!(code, Some("ValidationError") | None)
        && message.is_some_and(|m| m.contains("does not exist"))
}

/// How an S3 bucket probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketErrorKind {
    NotFound,
    AccessDenied,
    Other,
}

pub fn classify_bucket_error(code: Option<&str>, status: Option<u16>) -> BucketErrorKind {
    match (code, status) {
        (Some("NoSuchBucket"), _) | (_, Some(404)) => BucketErrorKind::NotFound,
        (Some("AccessDenied"), _) | (Some("AllAccessDisabled"), _) | (_, Some(403)) => {
            BucketErrorKind::AccessDenied
        }
        _ => BucketErrorKind::Other,
    }
}

/// Clients shared by the deploy and teardown workflows
#[derive(Clone)]
pub struct Clients {
    pub backend: Backend,
    pub runner: CommandRunner,
    pub stacks: Arc<dyn StackApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub bucket: Arc<dyn VersionedBucket>,
}

impl Clients {
    /// Build clients for the selected backend in `region`
    pub async fn connect(backend: Backend, region: &str) -> Self {
        let runner = CommandRunner::new();
        match backend {
            Backend::Sdk => {
                let sdk = Arc::new(sdk::SdkBackend::connect(region).await);
                Self {
                    backend,
                    runner,
                    stacks: sdk.clone(),
                    identity: sdk.clone(),
                    bucket: sdk,
                }
            }
            Backend::Cli => {
                let cli = Arc::new(cli::CliBackend::new(runner.clone(), region));
                Self {
                    backend,
                    runner,
                    stacks: cli.clone(),
                    identity: cli.clone(),
                    bucket: cli,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_wait_states() {
        let op = StackOperation::Create;
        assert_eq!(classify_status(op, "CREATE_IN_PROGRESS"), WaitState::Pending);
        assert_eq!(classify_status(op, "CREATE_COMPLETE"), WaitState::Complete);
        assert_eq!(classify_status(op, "ROLLBACK_IN_PROGRESS"), WaitState::Pending);
        assert_eq!(classify_status(op, "ROLLBACK_COMPLETE"), WaitState::Failed);
        assert_eq!(classify_status(op, "CREATE_FAILED"), WaitState::Failed);
    }

    #[test]
    fn update_wait_states() {
        let op = StackOperation::Update;
        assert_eq!(
            classify_status(op, "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"),
            WaitState::Pending
        );
        assert_eq!(classify_status(op, "UPDATE_COMPLETE"), WaitState::Complete);
        assert_eq!(
            classify_status(op, "UPDATE_ROLLBACK_COMPLETE"),
            WaitState::Failed
        );
    }

    #[test]
    fn delete_wait_states() {
        let op = StackOperation::Delete;
        assert_eq!(classify_status(op, "DELETE_IN_PROGRESS"), WaitState::Pending);
        assert_eq!(classify_status(op, "DELETE_COMPLETE"), WaitState::Complete);
        assert_eq!(classify_status(op, "DELETE_FAILED"), WaitState::Failed);
    }

    #[test]
    fn no_op_update_needs_marker() {
        assert!(is_no_op_update(
            Some("ValidationError"),
            Some("No updates are to be performed.")
        ));
        assert!(!is_no_op_update(
            Some("ValidationError"),
            Some("Template format error")
        ));
        assert!(!is_no_op_update(
            Some("InsufficientCapabilitiesException"),
            Some("No updates are to be performed.")
        ));
        assert!(!is_no_op_update(Some("ValidationError"), None));
    }

    #[test]
    fn missing_stack_detection() {
        assert!(is_missing_stack(
            Some("ValidationError"),
            Some("Stack with id demo does not exist")
        ));
        assert!(!is_missing_stack(Some("Throttling"), Some("Rate exceeded")));
    }

    #[test]
    fn bucket_error_kinds() {
        assert_eq!(
            classify_bucket_error(Some("NoSuchBucket"), Some(404)),
            BucketErrorKind::NotFound
        );
        assert_eq!(classify_bucket_error(None, Some(404)), BucketErrorKind::NotFound);
        assert_eq!(
            classify_bucket_error(Some("AccessDenied"), Some(403)),
            BucketErrorKind::AccessDenied
        );
        assert_eq!(classify_bucket_error(None, Some(403)), BucketErrorKind::AccessDenied);
        assert_eq!(
            classify_bucket_error(Some("SlowDown"), Some(503)),
            BucketErrorKind::Other
        );
    }
}
