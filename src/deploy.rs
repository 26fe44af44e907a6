//! `trustbucket deploy`: create or update the stack and record its outputs

use crate::cloud::{Clients, StackRequest, UpdateOutcome};
use crate::error::{Error, Result, StackOperation};
use crate::outputs::OutputsStore;
use crate::preflight;
use anyhow::Context;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use trustbucket_config::{
    resolve_deploy_options, ConfigError, DeployFlags, DeployOptions, EnvSource, Settings,
    StackOutput,
};

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// AWS region (falls back to AWS_DEFAULT_REGION, then outputs.json)
    #[arg(long)]
    pub region: Option<String>,

    /// S3 bucket name (falls back to BUCKET_NAME, then outputs.json)
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// First account allowed to assume the role (falls back to TRUST_ACCOUNT_ONE)
    #[arg(long)]
    pub trust_account_one: Option<String>,

    /// Second account allowed to assume the role (falls back to TRUST_ACCOUNT_TWO)
    #[arg(long)]
    pub trust_account_two: Option<String>,

    /// CloudFormation stack name
    #[arg(long)]
    pub stack_name: Option<String>,

    /// CloudFormation template file
    #[arg(long, value_name = "FILE")]
    pub template_file: Option<PathBuf>,
}

impl DeployArgs {
    fn flags(&self) -> DeployFlags {
        DeployFlags {
            region: self.region.clone(),
            bucket_name: self.bucket_name.clone(),
            trust_account_one: self.trust_account_one.clone(),
            trust_account_two: self.trust_account_two.clone(),
        }
    }
}

/// What a deploy did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub stack_name: String,
    pub operation: StackOperation,
    /// False when the update was a no-op
    pub changed: bool,
    pub outputs: Vec<StackOutput>,
}

pub fn stack_parameters(options: &DeployOptions) -> Vec<(String, String)> {
    vec![
        ("BucketName".to_string(), options.bucket_name.clone()),
        (
            "TrustAccountOne".to_string(),
            options.trust_account_one.clone(),
        ),
        (
            "TrustAccountTwo".to_string(),
            options.trust_account_two.clone(),
        ),
    ]
}

/// Create or update the stack, wait for it, and overwrite the outputs record.
///
/// Validation runs before any AWS call. If writing the record fails after the
/// stack changed, the error is returned and the stack is left as deployed.
pub async fn deploy(
    options: &DeployOptions,
    clients: &Clients,
    store: &dyn OutputsStore,
) -> Result<DeployReport> {
    options.validate()?;

    let template_body = tokio::fs::read_to_string(&options.template_file)
        .await
        .map_err(|e| Error::io("Failed to read template", &options.template_file, e))?;

    preflight::run(clients).await?;

    let request = StackRequest {
        stack_name: options.stack_name.clone(),
        template_path: options.template_file.clone(),
        template_body,
        parameters: stack_parameters(options),
    };

    let stacks = clients.stacks.as_ref();
    let (operation, changed) = if stacks.stack_exists(&options.stack_name).await? {
        info!(stack = %options.stack_name, "Stack exists, updating");
        match stacks.update_stack(&request).await? {
            UpdateOutcome::Started => (StackOperation::Update, true),
            UpdateOutcome::NoChanges => {
                info!(stack = %options.stack_name, "No updates are to be performed");
                (StackOperation::Update, false)
            }
        }
    } else {
        info!(stack = %options.stack_name, "Stack not found, creating");
        stacks.create_stack(&request).await?;
        (StackOperation::Create, true)
    };

    if changed {
        stacks.wait_for(&options.stack_name, operation).await?;
    }

    let outputs = stacks.describe_outputs(&options.stack_name).await?;
    store.write(&outputs)?;
    info!(
        count = outputs.len(),
        location = %store.location(),
        "Saved stack outputs"
    );

    Ok(DeployReport {
        stack_name: options.stack_name.clone(),
        operation,
        changed,
        outputs,
    })
}

/// Remediation text shown when a trust account is missing
pub fn trust_accounts_help() -> String {
    let policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "arn:aws:iam::111111111111:root",
                    "arn:aws:iam::222222222222:root"
                ]
            },
            "Action": "sts:AssumeRole"
        }]
    });
    let policy = serde_json::to_string_pretty(&policy).unwrap_or_else(|_| policy.to_string());

    format!(
        "The stack creates a role that two external accounts may assume.\n\
         Both account IDs are required; the resulting trust policy looks like:\n\n\
         {policy}\n\n\
         Example:\n  \
         trustbucket deploy --trust-account-one 111111111111 --trust-account-two 222222222222\n\n\
         or:\n  \
         TRUST_ACCOUNT_ONE=111111111111 TRUST_ACCOUNT_TWO=222222222222 trustbucket deploy\n"
    )
}

pub async fn run<E: EnvSource>(
    args: DeployArgs,
    settings: &Settings,
    env: &E,
    store: &dyn OutputsStore,
) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(stack_name) = &args.stack_name {
        settings.stack_name = stack_name.clone();
    }
    if let Some(template_file) = &args.template_file {
        settings.template_file = template_file.clone();
    }
    settings.validate()?;

    let record = store
        .read()
        .with_context(|| format!("Failed to read outputs record {}", store.location()))?;
    let options = resolve_deploy_options(&args.flags(), env, &record, &settings);

    if let Err(e) = options.validate() {
        if matches!(e, ConfigError::MissingTrustAccounts { .. }) {
            eprintln!("{}", trust_accounts_help());
        }
        return Err(e.into());
    }

    println!();
    println!("trustbucket deploy - CloudFormation stack + S3 bucket");
    println!();
    println!("  Stack:    {}", options.stack_name);
    println!("  Region:   {}", options.region);
    println!("  Bucket:   {}", options.bucket_name);
    println!(
        "  Trusted:  {}, {}",
        options.trust_account_one, options.trust_account_two
    );
    println!();

    let clients = Clients::connect(settings.backend, &options.region).await;
    let report = deploy(&options, &clients, store).await?;

    let verb = match (report.operation, report.changed) {
        (StackOperation::Create, _) => "created",
        (_, true) => "updated",
        (_, false) => "already up to date",
    };
    println!("Stack {} {}.", report.stack_name, verb);
    println!();
    println!("Outputs saved to {}:", store.location());
    for output in &report.outputs {
        println!("  {} = {}", output.output_key, output.output_value);
    }
    println!();
    println!("Next steps:");
    println!("  trustbucket seed");
    println!();

    Ok(())
}
