// Validation for settings and workflow options
//
// Hard failures for values AWS would reject; warnings for values that are
// legal but probably a typo.

use crate::{ConfigError, Settings};
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.stack_name.trim().is_empty() {
        bail!("stack_name must not be empty");
    }
    if settings.stack_name.len() > 128 {
        bail!("stack_name must be at most 128 characters");
    }
    if !settings
        .stack_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
        || !settings.stack_name.starts_with(|c: char| c.is_ascii_alphabetic())
    {
        bail!(
            "stack_name '{}' must start with a letter and contain only letters, numbers, and hyphens",
            settings.stack_name
        );
    }
    if settings.outputs_file.as_os_str().is_empty() {
        bail!("outputs_file must not be empty");
    }
    Ok(())
}

/// S3 bucket naming rules (general purpose buckets)
pub fn validate_bucket_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("bucket name cannot be empty"));
    }
    if name.len() < 3 || name.len() > 63 {
        return Err(invalid("bucket name must be 3-63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "bucket name must contain only lowercase letters, numbers, dots, and hyphens",
        ));
    }
    let edge_ok = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(edge_ok) || !name.ends_with(edge_ok) {
        return Err(invalid(
            "bucket name must start and end with a letter or number",
        ));
    }
    if name.contains("..") {
        return Err(invalid("bucket name cannot contain consecutive dots"));
    }
    if name.split('.').count() == 4 && name.split('.').all(|p| p.parse::<u8>().is_ok()) {
        return Err(invalid("bucket name cannot be formatted as an IP address"));
    }
    Ok(())
}

/// Both trust account identifiers must be present before a stack operation
pub fn validate_trust_accounts(one: &str, two: &str) -> Result<(), ConfigError> {
    let mut missing = Vec::new();
    if one.trim().is_empty() {
        missing.push("TRUST_ACCOUNT_ONE");
    }
    if two.trim().is_empty() {
        missing.push("TRUST_ACCOUNT_TWO");
    }
    if !missing.is_empty() {
        return Err(ConfigError::MissingTrustAccounts { missing });
    }

    for (name, id) in [("TRUST_ACCOUNT_ONE", one), ("TRUST_ACCOUNT_TWO", two)] {
        if id.len() != 12 || !id.chars().all(|c| c.is_ascii_digit()) {
            warn!(
                account = id,
                "{} does not look like a 12-digit AWS account ID", name
            );
        }
    }
    Ok(())
}
