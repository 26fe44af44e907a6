//! Error types for trustbucket workflows

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use trustbucket_config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

/// The stack operation a request or wait refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackOperation::Create => write!(f, "create"),
            StackOperation::Update => write!(f, "update"),
            StackOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Errors that can occur while deploying, seeding, or tearing down
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed options
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The `aws` binary could not be invoked
    #[error("AWS CLI is not available: {reason}\n\nInstall it from https://aws.amazon.com/cli/ and make sure `aws` is on PATH.")]
    CliUnavailable { reason: String },

    /// Identity resolution failed
    #[error("AWS credentials are not usable: {reason}\n\nConfigure credentials with `aws configure`, or set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY.")]
    CredentialsUnavailable { reason: String },

    /// A strict command run exited unsuccessfully
    #[error("{description} failed: {error}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    CommandFailed {
        description: String,
        error: String,
        stdout: String,
        stderr: String,
    },

    /// A CloudFormation call failed
    #[error("Stack '{stack}' {operation} failed: {reason}")]
    StackOperation {
        stack: String,
        operation: StackOperation,
        reason: String,
    },

    /// Reading a stack's status or outputs failed
    #[error("Could not describe stack '{stack}': {reason}")]
    StackDescribe { stack: String, reason: String },

    /// Waiting ended in a terminal status other than the expected one
    #[error("Stack '{stack}' {operation} ended in {status}: {reason}")]
    StackFailed {
        stack: String,
        operation: StackOperation,
        status: String,
        reason: String,
    },

    #[error("Bucket '{bucket}' does not exist. Deploy the stack first or pass the right bucket name.")]
    BucketNotFound { bucket: String },

    #[error("Access denied to bucket '{bucket}'. Check your IAM permissions and the bucket policy.")]
    BucketAccessDenied { bucket: String },

    #[error("Bucket '{bucket}' is not reachable: {reason}")]
    BucketUnreachable { bucket: String, reason: String },

    /// Any other S3 call failure
    #[error("S3 {action} failed for '{bucket}/{key}': {reason}")]
    Object {
        action: &'static str,
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
