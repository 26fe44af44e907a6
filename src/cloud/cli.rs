//! AWS CLI backend: every call is an `aws ...` command run through
//! [`CommandRunner`].

use super::{
    is_missing_stack, CallerIdentity, IdentityApi, ObjectVersion, StackApi, StackRequest,
    UpdateOutcome, VersionListing, VersionedBucket, STACK_CAPABILITY,
};
use crate::error::{Error, Result, StackOperation};
use crate::runner::CommandRunner;
use serde::Deserialize;
use trustbucket_config::{parse_stack_outputs, StackOutput};

pub struct CliBackend {
    runner: CommandRunner,
    region: String,
}

impl CliBackend {
    pub fn new(runner: CommandRunner, region: &str) -> Self {
        Self {
            runner,
            region: region.to_string(),
        }
    }

    /// Quote `args` into an `aws` command line for this region
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut words: Vec<&str> = vec!["aws"];
        words.extend(args.iter().map(|a| a.as_ref()));
        words.extend(["--region", self.region.as_str()]);
        shell_words::join(words)
    }

    /// Arguments for `create-stack` / `update-stack`
    pub fn stack_args(verb: &str, request: &StackRequest) -> Vec<String> {
        let mut args = vec![
            "cloudformation".to_string(),
            verb.to_string(),
            "--stack-name".to_string(),
            request.stack_name.clone(),
            "--template-body".to_string(),
            format!("file://{}", request.template_path.display()),
            "--capabilities".to_string(),
            STACK_CAPABILITY.to_string(),
        ];
        if !request.parameters.is_empty() {
            args.push("--parameters".to_string());
            args.extend(
                request
                    .parameters
                    .iter()
                    .map(|(k, v)| format!("ParameterKey={k},ParameterValue={v}")),
            );
        }
        args
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityDocument {
    account: String,
    arn: String,
    user_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionsDocument {
    #[serde(default)]
    versions: Option<Vec<VersionEntry>>,
    #[serde(default)]
    delete_markers: Option<Vec<VersionEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionEntry {
    key: String,
    version_id: Option<String>,
}

impl From<VersionEntry> for ObjectVersion {
    fn from(entry: VersionEntry) -> Self {
        ObjectVersion {
            key: entry.key,
            version_id: entry.version_id.unwrap_or_else(|| "null".to_string()),
        }
    }
}

/// Parse `s3api list-object-versions` output; empty output means an empty bucket
pub fn parse_version_listing(json: &str) -> Result<VersionListing> {
    if json.trim().is_empty() {
        return Ok(VersionListing::default());
    }
    let doc: VersionsDocument = serde_json::from_str(json).map_err(|source| Error::Parse {
        what: "object version listing",
        source,
    })?;
    Ok(VersionListing {
        versions: doc
            .versions
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect(),
        delete_markers: doc
            .delete_markers
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect(),
    })
}

#[async_trait::async_trait]
impl StackApi for CliBackend {
    async fn stack_exists(&self, stack_name: &str) -> Result<bool> {
        let description = format!("Checking whether stack {stack_name} exists");
        let command = self.command(&[
            "cloudformation",
            "describe-stacks",
            "--stack-name",
            stack_name,
        ]);
        let outcome = self.runner.run_safe(&command, &description).await;
        if !outcome.is_success() && is_missing_stack(None, Some(&outcome.failure_text())) {
            return Ok(false);
        }
        outcome.into_result(&description).map(|_| true)
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        let description = format!("Creating stack {}", request.stack_name);
        let command = self.command(&Self::stack_args("create-stack", request));
        self.runner
            .run_safe(&command, &description)
            .await
            .into_result(&description)?;
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome> {
        let description = format!("Updating stack {}", request.stack_name);
        let command = self.command(&Self::stack_args("update-stack", request));
        let outcome = self.runner.run_safe(&command, &description).await;
        if outcome.is_no_op_update() {
            return Ok(UpdateOutcome::NoChanges);
        }
        outcome
            .into_result(&description)
            .map(|_| UpdateOutcome::Started)
    }

    async fn wait_for(&self, stack_name: &str, operation: StackOperation) -> Result<()> {
        let waiter = format!("stack-{operation}-complete");
        let description = format!("Waiting for stack {stack_name} {operation} to complete");
        let command = self.command(&[
            "cloudformation",
            "wait",
            waiter.as_str(),
            "--stack-name",
            stack_name,
        ]);
        self.runner
            .run(&command, &description)
            .await
            .map_err(|e| Error::StackFailed {
                stack: stack_name.to_string(),
                operation,
                status: "WAIT_FAILED".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn describe_outputs(&self, stack_name: &str) -> Result<Vec<StackOutput>> {
        let description = format!("Fetching outputs of stack {stack_name}");
        let command = self.command(&[
            "cloudformation",
            "describe-stacks",
            "--stack-name",
            stack_name,
            "--query",
            "Stacks[0].Outputs",
            "--output",
            "json",
        ]);
        let stdout = self.runner.run(&command, &description).await?;
        parse_stack_outputs(&stdout).map_err(|source| Error::Parse {
            what: "stack outputs",
            source,
        })
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        let description = format!("Deleting stack {stack_name}");
        let command = self.command(&[
            "cloudformation",
            "delete-stack",
            "--stack-name",
            stack_name,
        ]);
        self.runner.run(&command, &description).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityApi for CliBackend {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let command = self.command(&["sts", "get-caller-identity", "--output", "json"]);
        let stdout = self
            .runner
            .run(&command, "Resolving caller identity")
            .await
            .map_err(|e| Error::CredentialsUnavailable {
                reason: e.to_string(),
            })?;
        let doc: IdentityDocument =
            serde_json::from_str(&stdout).map_err(|source| Error::Parse {
                what: "caller identity",
                source,
            })?;
        Ok(CallerIdentity {
            account: doc.account,
            arn: doc.arn,
            user_id: doc.user_id,
        })
    }
}

#[async_trait::async_trait]
impl VersionedBucket for CliBackend {
    async fn list_versions(&self, bucket: &str) -> Result<VersionListing> {
        let command = self.command(&[
            "s3api",
            "list-object-versions",
            "--bucket",
            bucket,
            "--output",
            "json",
        ]);
        let stdout = self
            .runner
            .run(&command, &format!("Listing object versions in {bucket}"))
            .await?;
        parse_version_listing(&stdout)
    }

    async fn delete_version(&self, bucket: &str, entry: &ObjectVersion) -> Result<()> {
        let command = self.command(&[
            "s3api",
            "delete-object",
            "--bucket",
            bucket,
            "--key",
            entry.key.as_str(),
            "--version-id",
            entry.version_id.as_str(),
        ]);
        self.runner
            .run(
                &command,
                &format!("Deleting {} (version {})", entry.key, entry.version_id),
            )
            .await?;
        Ok(())
    }
}
