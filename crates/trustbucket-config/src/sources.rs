// Settings source loading.
//
// Priority order (CLI flags are layered on top by the binary):
// 1. Environment variables (TRUSTBUCKET_* prefix)
// 2. Config file from --config, else TRUSTBUCKET_CONFIG
// 3. Default config file (./trustbucket.toml)
// 4. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::Settings;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "./trustbucket.toml";

pub fn load_settings<E: EnvSource>(explicit_path: Option<&Path>, env: &E) -> Result<Settings> {
    let mut settings = match config_file_path(explicit_path, env) {
        Some(path) => read_settings_file(&path)?,
        None => Settings::default(),
    };

    env_overrides::apply_env_overrides(&mut settings, env)?;
    settings.validate()?;
    Ok(settings)
}

fn config_file_path<E: EnvSource>(explicit_path: Option<&Path>, env: &E) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.get("CONFIG").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    default.exists().then(|| default.to_path_buf())
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Environment source backed by the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}
