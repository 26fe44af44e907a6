//! In-memory AWS fakes shared by the workflow tests
//!
//! Every fake appends a short description of each call to a shared
//! [`CallLog`] so tests can assert on ordering and on calls that must not
//! happen.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use trustbucket::cloud::{
    CallerIdentity, Clients, IdentityApi, ObjectVersion, PutObject, SeedBucket, StackApi,
    StackRequest, UpdateOutcome, VersionListing, VersionedBucket,
};
use trustbucket::{CommandRunner, Error, Result, StackOperation};
use trustbucket_config::{Backend, StackOutput};

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

pub struct FakeStacks {
    pub log: CallLog,
    pub exists: bool,
    pub update: UpdateOutcome,
    pub outputs: Vec<StackOutput>,
    pub fail_wait: bool,
}

impl FakeStacks {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            exists: false,
            update: UpdateOutcome::Started,
            outputs: Vec::new(),
            fail_wait: false,
        }
    }
}

#[async_trait]
impl StackApi for FakeStacks {
    async fn stack_exists(&self, stack_name: &str) -> Result<bool> {
        self.log.record(format!("stack_exists {stack_name}"));
        Ok(self.exists)
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        self.log.record(format!("create_stack {}", request.stack_name));
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome> {
        self.log.record(format!("update_stack {}", request.stack_name));
        Ok(self.update)
    }

    async fn wait_for(&self, stack_name: &str, operation: StackOperation) -> Result<()> {
        self.log.record(format!("wait_for {stack_name} {operation}"));
        if self.fail_wait {
            return Err(Error::StackFailed {
                stack: stack_name.to_string(),
                operation,
                status: "ROLLBACK_COMPLETE".to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    async fn describe_outputs(&self, stack_name: &str) -> Result<Vec<StackOutput>> {
        self.log.record(format!("describe_outputs {stack_name}"));
        Ok(self.outputs.clone())
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.log.record(format!("delete_stack {stack_name}"));
        Ok(())
    }
}

pub struct FakeIdentity {
    pub log: CallLog,
    pub valid: bool,
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        self.log.record("caller_identity");
        if !self.valid {
            return Err(Error::CredentialsUnavailable {
                reason: "no credentials".to_string(),
            });
        }
        Ok(CallerIdentity {
            account: "999999999999".to_string(),
            arn: "arn:aws:iam::999999999999:user/tester".to_string(),
            user_id: "AIDATEST".to_string(),
        })
    }
}

pub struct FakeVersionedBucket {
    pub log: CallLog,
    /// `None` makes the listing call fail
    pub listing: Option<VersionListing>,
    pub fail_delete_key: Option<String>,
}

#[async_trait]
impl VersionedBucket for FakeVersionedBucket {
    async fn list_versions(&self, bucket: &str) -> Result<VersionListing> {
        self.log.record(format!("list_versions {bucket}"));
        self.listing.clone().ok_or_else(|| Error::BucketUnreachable {
            bucket: bucket.to_string(),
            reason: "listing denied".to_string(),
        })
    }

    async fn delete_version(&self, bucket: &str, entry: &ObjectVersion) -> Result<()> {
        self.log
            .record(format!("delete_version {} {}", entry.key, entry.version_id));
        if self.fail_delete_key.as_deref() == Some(entry.key.as_str()) {
            return Err(Error::Object {
                action: "delete",
                bucket: bucket.to_string(),
                key: entry.key.clone(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

pub fn version(key: &str, version_id: &str) -> ObjectVersion {
    ObjectVersion {
        key: key.to_string(),
        version_id: version_id.to_string(),
    }
}

/// Seed target that fails uploads for selected keys
#[derive(Default)]
pub struct FakeSeedBucket {
    pub probe_error: Mutex<Option<Error>>,
    pub fail_keys: HashSet<String>,
    pub puts: Mutex<Vec<PutObject>>,
}

impl FakeSeedBucket {
    pub fn failing(keys: &[&str]) -> Self {
        Self {
            fail_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn uploaded(&self) -> Vec<PutObject> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeedBucket for FakeSeedBucket {
    async fn probe(&self, _bucket: &str) -> Result<()> {
        match self.probe_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn put_object(&self, request: PutObject) -> Result<Option<String>> {
        if self.fail_keys.contains(&request.key) {
            return Err(Error::Object {
                action: "upload",
                bucket: request.bucket,
                key: request.key,
                reason: "simulated failure".to_string(),
            });
        }
        let etag = format!("\"etag-{}\"", request.key);
        self.puts.lock().unwrap().push(request);
        Ok(Some(etag))
    }
}

/// Clients backed by fakes. The SDK backend label skips the CLI probe.
pub fn clients(stacks: FakeStacks, bucket: FakeVersionedBucket, log: CallLog) -> Clients {
    Clients {
        backend: Backend::Sdk,
        runner: CommandRunner::new(),
        stacks: Arc::new(stacks),
        identity: Arc::new(FakeIdentity { log, valid: true }),
        bucket: Arc::new(bucket),
    }
}

pub fn sample_outputs() -> Vec<StackOutput> {
    vec![
        StackOutput::new("BucketName", "demo-bucket"),
        StackOutput::new("BucketArn", "arn:aws:s3:::demo-bucket"),
        StackOutput::new("RoleArn", "arn:aws:iam::999999999999:role/demo"),
        StackOutput::new("Region", "us-east-1"),
    ]
}
