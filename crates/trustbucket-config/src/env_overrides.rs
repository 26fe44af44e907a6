use super::{Backend, LogFormat, Settings};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "TRUSTBUCKET_";

/// Abstraction over environment-variable lookups so tests can supply their own
/// source of overrides instead of mutating the process environment.
pub trait EnvSource {
    /// Get an environment variable WITH the TRUSTBUCKET_ prefix
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the TRUSTBUCKET_ prefix
    /// Used for AWS standard variables (AWS_DEFAULT_REGION, etc.) and the
    /// workflow overrides (BUCKET_NAME, TRUST_ACCOUNT_ONE, ...)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// In-memory environment, keyed by the full variable name
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Apply environment-variable overrides on top of file/default settings.
pub fn apply_env_overrides<E: EnvSource>(settings: &mut Settings, env: &E) -> Result<()> {
    if let Some(stack_name) = get_env_string(env, "STACK_NAME") {
        settings.stack_name = stack_name;
    }
    if let Some(path) = get_env_string(env, "TEMPLATE_FILE") {
        settings.template_file = PathBuf::from(path);
    }
    if let Some(path) = get_env_string(env, "OUTPUTS_FILE") {
        settings.outputs_file = PathBuf::from(path);
    }
    if let Some(path) = get_env_string(env, "SEED_DIR") {
        settings.seed_dir = PathBuf::from(path);
    }

    if let Some(backend) = get_env_string(env, "BACKEND") {
        settings.backend = backend
            .parse::<Backend>()
            .context("Invalid TRUSTBUCKET_BACKEND value")?;
    }

    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        settings.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        settings.log_format = format
            .parse::<LogFormat>()
            .context("Invalid TRUSTBUCKET_LOG_FORMAT value")?;
    }

    Ok(())
}

// Empty values count as unset
fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|v| !v.trim().is_empty())
}
