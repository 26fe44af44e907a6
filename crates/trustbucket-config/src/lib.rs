// trustbucket-config - Settings, option resolution and the outputs record
//
// Ambient settings are layered:
// 1. CLI flags (applied by the binary, highest priority)
// 2. Environment variables (TRUSTBUCKET_* prefix)
// 3. Config file (--config, TRUSTBUCKET_CONFIG, or ./trustbucket.toml)
// 4. Built-in defaults (lowest priority)
//
// Workflow options (region, bucket, trust accounts) follow their own chain:
// flag > environment variable > persisted outputs record > default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

mod env_overrides;
mod options;
mod outputs;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, MapEnvSource, ENV_PREFIX};
pub use options::{
    resolve_deploy_options, resolve_seed_options, resolve_teardown_options, DeployFlags,
    DeployOptions, SeedFlags, SeedOptions, TeardownFlags, TeardownOptions, DEFAULT_BUCKET_NAME,
    DEFAULT_REGION,
};
pub use outputs::{output_keys, parse_stack_outputs, OutputsRecord, StackOutput};
pub use sources::StdEnvSource;
pub use validation::{validate_bucket_name, validate_trust_accounts};

/// Errors raised while resolving or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid bucket name '{name}': {reason}")]
    InvalidBucketName { name: String, reason: String },

    #[error("Missing trust account identifier(s): {}", .missing.join(", "))]
    MissingTrustAccounts { missing: Vec<&'static str> },

    #[error("Output '{key}' not found in the outputs record. Run `trustbucket deploy` first.")]
    MissingOutput { key: String },

    #[error("No bucket name given and no '{key}' in the outputs record. Pass a bucket name or run `trustbucket deploy` first.")]
    MissingBucket { key: &'static str },

    #[error("Unsupported {what} '{value}'. Supported: {supported}")]
    Unsupported {
        what: &'static str,
        value: String,
        supported: &'static str,
    },
}

/// Ambient settings shared by all workflows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub stack_name: String,
    pub template_file: PathBuf,
    pub outputs_file: PathBuf,
    pub seed_dir: PathBuf,
    pub backend: Backend,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stack_name: "trustbucket-stack".to_string(),
            template_file: PathBuf::from("templates/stack.yaml"),
            outputs_file: PathBuf::from("outputs.json"),
            seed_dir: PathBuf::from("seed-data"),
            backend: Backend::Sdk,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Load settings from the config file (if any) and environment overrides
    pub fn load<E: EnvSource>(
        explicit_path: Option<&std::path::Path>,
        env: &E,
    ) -> anyhow::Result<Self> {
        sources::load_settings(explicit_path, env)
    }

    /// Validate the settings
    pub fn validate(&self) -> anyhow::Result<()> {
        validation::validate_settings(self)
    }
}

/// How AWS is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Typed AWS SDK clients
    Sdk,
    /// Shell out to the `aws` CLI
    Cli,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sdk => write!(f, "sdk"),
            Backend::Cli => write!(f, "cli"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sdk" => Ok(Backend::Sdk),
            "cli" | "aws-cli" => Ok(Backend::Cli),
            _ => Err(ConfigError::Unsupported {
                what: "backend",
                value: s.to_string(),
                supported: "sdk, cli",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Unsupported {
                what: "log format",
                value: s.to_string(),
                supported: "text, json",
            }),
        }
    }
}
