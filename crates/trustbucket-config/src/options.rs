// Workflow option resolution
//
// Every value resolves by precedence:
//   explicit flag > environment variable > persisted outputs record > default
// Empty strings at any level count as unset.

use crate::outputs::{output_keys, OutputsRecord};
use crate::validation::{validate_bucket_name, validate_trust_accounts};
use crate::{ConfigError, EnvSource, Settings};
use std::path::PathBuf;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET_NAME: &str = "trustbucket-sample-data";

/// Flags accepted by `deploy`
#[derive(Debug, Clone, Default)]
pub struct DeployFlags {
    pub region: Option<String>,
    pub bucket_name: Option<String>,
    pub trust_account_one: Option<String>,
    pub trust_account_two: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub stack_name: String,
    pub template_file: PathBuf,
    pub region: String,
    pub bucket_name: String,
    pub trust_account_one: String,
    pub trust_account_two: String,
}

impl DeployOptions {
    /// Check the invariants that must hold before any stack operation
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_trust_accounts(&self.trust_account_one, &self.trust_account_two)?;
        validate_bucket_name(&self.bucket_name)
    }
}

pub fn resolve_deploy_options<E: EnvSource>(
    flags: &DeployFlags,
    env: &E,
    record: &OutputsRecord,
    settings: &Settings,
) -> DeployOptions {
    let resolve = |flag: &Option<String>, var: &str, key: &str, default: &str| {
        first_set([
            flag.clone(),
            env.get_raw(var),
            record.get(key).map(str::to_string),
        ])
        .unwrap_or_else(|| default.to_string())
    };

    DeployOptions {
        stack_name: settings.stack_name.clone(),
        template_file: settings.template_file.clone(),
        region: resolve(
            &flags.region,
            "AWS_DEFAULT_REGION",
            output_keys::REGION,
            DEFAULT_REGION,
        ),
        bucket_name: resolve(
            &flags.bucket_name,
            "BUCKET_NAME",
            output_keys::BUCKET_NAME,
            DEFAULT_BUCKET_NAME,
        ),
        trust_account_one: resolve(
            &flags.trust_account_one,
            "TRUST_ACCOUNT_ONE",
            output_keys::TRUST_ACCOUNT_ONE,
            "",
        ),
        trust_account_two: resolve(
            &flags.trust_account_two,
            "TRUST_ACCOUNT_TWO",
            output_keys::TRUST_ACCOUNT_TWO,
            "",
        ),
    }
}

/// Flags accepted by `teardown`
#[derive(Debug, Clone, Default)]
pub struct TeardownFlags {
    pub region: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownOptions {
    pub stack_name: String,
    pub region: String,
    pub bucket_name: String,
    pub force: bool,
}

/// Resolve teardown options; the bucket name can only come from the outputs record.
pub fn resolve_teardown_options<E: EnvSource>(
    flags: &TeardownFlags,
    env: &E,
    record: &OutputsRecord,
    settings: &Settings,
) -> Result<TeardownOptions, ConfigError> {
    let bucket_name = record.require(output_keys::BUCKET_NAME)?.to_string();
    let region = first_set([
        flags.region.clone(),
        env.get_raw("AWS_DEFAULT_REGION"),
        record.get(output_keys::REGION).map(str::to_string),
    ])
    .unwrap_or_else(|| DEFAULT_REGION.to_string());

    Ok(TeardownOptions {
        stack_name: settings.stack_name.clone(),
        region,
        bucket_name,
        force: flags.force,
    })
}

/// Arguments accepted by `seed`
#[derive(Debug, Clone, Default)]
pub struct SeedFlags {
    pub bucket_name: Option<String>,
    pub seed_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOptions {
    pub bucket_name: String,
    pub region: String,
    pub seed_dir: PathBuf,
}

pub fn resolve_seed_options<E: EnvSource>(
    flags: &SeedFlags,
    env: &E,
    record: &OutputsRecord,
    settings: &Settings,
) -> Result<SeedOptions, ConfigError> {
    let bucket_name = first_set([
        flags.bucket_name.clone(),
        record.get(output_keys::BUCKET_NAME).map(str::to_string),
    ])
    .ok_or(ConfigError::MissingBucket {
        key: output_keys::BUCKET_NAME,
    })?;
    validate_bucket_name(&bucket_name)?;

    let region = first_set([
        env.get_raw("AWS_REGION"),
        record.get(output_keys::REGION).map(str::to_string),
    ])
    .unwrap_or_else(|| DEFAULT_REGION.to_string());

    Ok(SeedOptions {
        bucket_name,
        region,
        seed_dir: flags
            .seed_dir
            .clone()
            .unwrap_or_else(|| settings.seed_dir.clone()),
    })
}

fn first_set<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
