//! AWS SDK backend

use super::{
    classify_bucket_error, classify_status, is_missing_stack, is_no_op_update, BucketErrorKind,
    CallerIdentity, IdentityApi, ObjectVersion, PutObject, SeedBucket, StackApi, StackRequest,
    UpdateOutcome, VersionListing, VersionedBucket, WaitState, STACK_CAPABILITY,
};
use crate::error::{Error, Result, StackOperation};
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_cloudformation::Client as CfnClient;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sts::Client as StsClient;
use std::time::Duration;
use tracing::{debug, info};
use trustbucket_config::StackOutput;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct SdkBackend {
    cfn: CfnClient,
    s3: S3Client,
    sts: StsClient,
    poll_interval: Duration,
}

impl SdkBackend {
    /// Load the default credential chain for `region`
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::from_config(&config)
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self {
            cfn: CfnClient::new(config),
            s3: S3Client::new(config),
            sts: StsClient::new(config),
            poll_interval: POLL_INTERVAL,
        }
    }

    fn parameters(request: &StackRequest) -> Vec<Parameter> {
        request
            .parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect()
    }
}

fn reason<E: std::error::Error>(err: &E) -> String {
    DisplayErrorContext(err).to_string()
}

fn stack_error<E: std::error::Error>(stack: &str, operation: StackOperation, err: &E) -> Error {
    Error::StackOperation {
        stack: stack.to_string(),
        operation,
        reason: reason(err),
    }
}

#[async_trait::async_trait]
impl StackApi for SdkBackend {
    async fn stack_exists(&self, stack_name: &str) -> Result<bool> {
        match self.cfn.describe_stacks().stack_name(stack_name).send().await {
            Ok(out) => Ok(out.stacks().iter().any(|s| {
                s.stack_status()
                    .is_some_and(|status| status.as_str() != "DELETE_COMPLETE")
            })),
            Err(e) if is_missing_stack(e.code(), e.message()) => Ok(false),
            Err(e) => Err(Error::StackDescribe {
                stack: stack_name.to_string(),
                reason: reason(&e),
            }),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        let out = self
            .cfn
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(Self::parameters(request)))
            .capabilities(Capability::from(STACK_CAPABILITY))
            .send()
            .await
            .map_err(|e| stack_error(&request.stack_name, StackOperation::Create, &e))?;
        debug!(stack_id = ?out.stack_id(), "Create accepted");
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome> {
        match self
            .cfn
            .update_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(Self::parameters(request)))
            .capabilities(Capability::from(STACK_CAPABILITY))
            .send()
            .await
        {
            Ok(out) => {
                debug!(stack_id = ?out.stack_id(), "Update accepted");
                Ok(UpdateOutcome::Started)
            }
            Err(e) if is_no_op_update(e.code(), e.message()) => Ok(UpdateOutcome::NoChanges),
            Err(e) => Err(stack_error(&request.stack_name, StackOperation::Update, &e)),
        }
    }

    async fn wait_for(&self, stack_name: &str, operation: StackOperation) -> Result<()> {
        loop {
            let stack = match self.cfn.describe_stacks().stack_name(stack_name).send().await {
                Ok(out) => out.stacks().first().cloned(),
                Err(e)
                    if operation == StackOperation::Delete
                        && is_missing_stack(e.code(), e.message()) =>
                {
                    None
                }
                Err(e) => return Err(stack_error(stack_name, operation, &e)),
            };

            let Some(stack) = stack else {
                if operation == StackOperation::Delete {
                    return Ok(());
                }
                return Err(Error::StackFailed {
                    stack: stack_name.to_string(),
                    operation,
                    status: "MISSING".to_string(),
                    reason: "stack disappeared while waiting".to_string(),
                });
            };

            let status = stack
                .stack_status()
                .map(|s| s.as_str())
                .unwrap_or("UNKNOWN");
            match classify_status(operation, status) {
                WaitState::Complete => {
                    info!(stack = %stack_name, status = %status, "Stack {} complete", operation);
                    return Ok(());
                }
                WaitState::Failed => {
                    return Err(Error::StackFailed {
                        stack: stack_name.to_string(),
                        operation,
                        status: status.to_string(),
                        reason: stack
                            .stack_status_reason()
                            .unwrap_or("no reason reported")
                            .to_string(),
                    });
                }
                WaitState::Pending => {
                    debug!(stack = %stack_name, status = %status, "Waiting for stack");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn describe_outputs(&self, stack_name: &str) -> Result<Vec<StackOutput>> {
        let out = self
            .cfn
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| Error::StackDescribe {
                stack: stack_name.to_string(),
                reason: reason(&e),
            })?;

        let outputs = out
            .stacks()
            .first()
            .map(|stack| {
                stack
                    .outputs()
                    .iter()
                    .map(|o| StackOutput {
                        output_key: o.output_key().unwrap_or_default().to_string(),
                        output_value: o.output_value().unwrap_or_default().to_string(),
                        description: o.description().map(str::to_string),
                        export_name: o.export_name().map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(outputs)
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.cfn
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| stack_error(stack_name, StackOperation::Delete, &e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityApi for SdkBackend {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| Error::CredentialsUnavailable { reason: reason(&e) })?;
        Ok(CallerIdentity {
            account: out.account().unwrap_or_default().to_string(),
            arn: out.arn().unwrap_or_default().to_string(),
            user_id: out.user_id().unwrap_or_default().to_string(),
        })
    }
}

#[async_trait::async_trait]
impl VersionedBucket for SdkBackend {
    async fn list_versions(&self, bucket: &str) -> Result<VersionListing> {
        let out = self
            .s3
            .list_object_versions()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| Error::BucketUnreachable {
                bucket: bucket.to_string(),
                reason: reason(&e),
            })?;

        let entry = |key: Option<&str>, version_id: Option<&str>| ObjectVersion {
            key: key.unwrap_or_default().to_string(),
            version_id: version_id.unwrap_or("null").to_string(),
        };
        Ok(VersionListing {
            versions: out
                .versions()
                .iter()
                .map(|v| entry(v.key(), v.version_id()))
                .collect(),
            delete_markers: out
                .delete_markers()
                .iter()
                .map(|m| entry(m.key(), m.version_id()))
                .collect(),
        })
    }

    async fn delete_version(&self, bucket: &str, entry: &ObjectVersion) -> Result<()> {
        self.s3
            .delete_object()
            .bucket(bucket)
            .key(&entry.key)
            .version_id(&entry.version_id)
            .send()
            .await
            .map_err(|e| Error::Object {
                action: "delete",
                bucket: bucket.to_string(),
                key: entry.key.clone(),
                reason: reason(&e),
            })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SeedBucket for SdkBackend {
    async fn probe(&self, bucket: &str) -> Result<()> {
        match self
            .s3
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let bucket = bucket.to_string();
                Err(match classify_bucket_error(e.code(), status) {
                    BucketErrorKind::NotFound => Error::BucketNotFound { bucket },
                    BucketErrorKind::AccessDenied => Error::BucketAccessDenied { bucket },
                    BucketErrorKind::Other => Error::BucketUnreachable {
                        bucket,
                        reason: reason(&e),
                    },
                })
            }
        }
    }

    async fn put_object(&self, request: PutObject) -> Result<Option<String>> {
        let PutObject {
            bucket,
            key,
            body,
            content_type,
            metadata,
        } = request;
        let out = self
            .s3
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| Error::Object {
                action: "upload",
                bucket,
                key,
                reason: reason(&e),
            })?;
        Ok(out.e_tag().map(str::to_string))
    }
}
