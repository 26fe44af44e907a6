//! `trustbucket teardown`: empty the bucket, delete the stack, forget the outputs

use crate::cloud::{Clients, VersionedBucket};
use crate::error::{Result, StackOperation};
use crate::outputs::OutputsStore;
use crate::preflight;
use anyhow::Context;
use clap::Args;
use dialoguer::Input;
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::{info, warn};
use trustbucket_config::{
    resolve_teardown_options, EnvSource, Settings, TeardownFlags, TeardownOptions,
};

#[derive(Args, Debug, Default)]
pub struct TeardownArgs {
    /// AWS region (falls back to AWS_DEFAULT_REGION, then outputs.json)
    #[arg(long)]
    pub region: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,

    /// CloudFormation stack name
    #[arg(long)]
    pub stack_name: Option<String>,
}

/// Deletes performed while emptying the bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyReport {
    pub versions_deleted: usize,
    pub markers_deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReport {
    /// Nothing to delete; the outputs record was left alone
    StackMissing,
    Deleted { emptied: EmptyReport },
}

/// Delete every object version and delete marker from `bucket`.
///
/// The listing is a single call. If it fails the bucket is assumed to be
/// empty already; a failed delete aborts.
pub async fn empty_bucket(bucket: &dyn VersionedBucket, name: &str) -> Result<EmptyReport> {
    let listing = match bucket.list_versions(name).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!(bucket = %name, error = %e, "Could not list object versions, assuming bucket is empty");
            return Ok(EmptyReport::default());
        }
    };

    let mut report = EmptyReport::default();
    for version in &listing.versions {
        bucket.delete_version(name, version).await?;
        report.versions_deleted += 1;
    }
    for marker in &listing.delete_markers {
        bucket.delete_version(name, marker).await?;
        report.markers_deleted += 1;
    }

    info!(
        bucket = %name,
        versions = report.versions_deleted,
        markers = report.markers_deleted,
        "Bucket emptied"
    );
    Ok(report)
}

/// Tear everything down in order, stopping at the first failure.
pub async fn teardown(
    options: &TeardownOptions,
    clients: &Clients,
    store: &dyn OutputsStore,
) -> Result<TeardownReport> {
    preflight::run(clients).await?;

    let stacks = clients.stacks.as_ref();
    if !stacks.stack_exists(&options.stack_name).await? {
        info!(stack = %options.stack_name, "Stack does not exist, nothing to tear down");
        return Ok(TeardownReport::StackMissing);
    }

    let emptied = empty_bucket(clients.bucket.as_ref(), &options.bucket_name).await?;

    info!(stack = %options.stack_name, "Deleting stack");
    stacks.delete_stack(&options.stack_name).await?;
    stacks
        .wait_for(&options.stack_name, StackOperation::Delete)
        .await?;

    store.remove()?;
    info!(location = %store.location(), "Removed outputs record");

    Ok(TeardownReport::Deleted { emptied })
}

fn consequences(options: &TeardownOptions, store: &dyn OutputsStore) -> Vec<String> {
    vec![
        format!(
            "S3 bucket {} and every object version in it",
            options.bucket_name
        ),
        "The IAM role trusted by the two external accounts".to_string(),
        format!("CloudFormation stack {}", options.stack_name),
        format!("Local outputs record {}", store.location()),
    ]
}

/// Only the literal word `yes` proceeds
pub fn is_confirmed(answer: &str) -> bool {
    answer.trim() == "yes"
}

fn read_answer() -> anyhow::Result<String> {
    const PROMPT: &str = "Type 'yes' to continue";

    if io::stdin().is_terminal() && io::stderr().is_terminal() {
        return Ok(Input::new()
            .with_prompt(PROMPT)
            .allow_empty(true)
            .interact_text()?);
    }

    // Piped stdin: take a single line, EOF reads as an empty answer
    print!("{PROMPT}: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer)
}

fn confirm(options: &TeardownOptions, store: &dyn OutputsStore) -> anyhow::Result<bool> {
    println!("This will permanently delete:");
    for item in consequences(options, store) {
        println!("  - {item}");
    }
    println!();
    Ok(is_confirmed(&read_answer()?))
}

pub async fn run<E: EnvSource>(
    args: TeardownArgs,
    settings: &Settings,
    env: &E,
    store: &dyn OutputsStore,
) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(stack_name) = &args.stack_name {
        settings.stack_name = stack_name.clone();
    }
    settings.validate()?;

    let record = store
        .read()
        .with_context(|| format!("Failed to read outputs record {}", store.location()))?;
    let flags = TeardownFlags {
        region: args.region.clone(),
        force: args.force,
    };
    let options = resolve_teardown_options(&flags, env, &record, &settings)?;

    println!();
    println!("trustbucket teardown - stack {} in {}", options.stack_name, options.region);
    println!();

    if !options.force && !confirm(&options, store)? {
        println!("Aborted.");
        return Ok(());
    }

    let clients = Clients::connect(settings.backend, &options.region).await;
    match teardown(&options, &clients, store).await? {
        TeardownReport::StackMissing => {
            println!("Stack {} does not exist. Nothing to do.", options.stack_name);
        }
        TeardownReport::Deleted { emptied } => {
            println!(
                "Deleted {} object version(s) and {} delete marker(s) from {}.",
                emptied.versions_deleted, emptied.markers_deleted, options.bucket_name
            );
            println!("Stack {} deleted.", options.stack_name);
            println!("Removed {}.", store.location());
        }
    }
    println!();

    Ok(())
}
