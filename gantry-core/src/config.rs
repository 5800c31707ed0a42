//! Engine configuration.
//!
//! Resolved once at process start and passed by reference into the engine.
//! Precedence, lowest first:
//!
//! 1. built-in defaults (`namespace = "gantry"`, `store_dir = <root>/.gantry/remote`)
//! 2. `<root>/gantry.yaml`
//! 3. `<root>/.env`
//! 4. the process environment
//!
//! Reading `.env` never mutates the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::layout::{default_store_dir_at, DOTENV_FILE, PROJECT_CONFIG_FILE};

pub const ENV_BUCKET: &str = "GANTRY_S3_BUCKET";
pub const ENV_NAMESPACE: &str = "GANTRY_NAMESPACE";
pub const ENV_IAM_ROLE: &str = "GANTRY_IAM_ROLE";
pub const ENV_ACCOUNT: &str = "GANTRY_AWS_ACCOUNT";
pub const ENV_STORE_DIR: &str = "GANTRY_STORE_DIR";

pub const DEFAULT_NAMESPACE: &str = "gantry";

/// Shape of `gantry.yaml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GantryConfig {
    pub project_root: PathBuf,
    pub bucket: Option<String>,
    pub namespace: String,
    pub iam_role: Option<String>,
    pub account_id: Option<u64>,
    /// Root directory of the local object store and job registry adapters.
    pub store_dir: PathBuf,
}

/// Bucket plus key namespace: everything the reconciler needs to address
/// remote objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub bucket: String,
    pub namespace: String,
}

impl GantryConfig {
    /// Defaults only; nothing is read from disk or the environment.
    pub fn defaults_at(project_root: &Path) -> Self {
        GantryConfig {
            project_root: project_root.to_path_buf(),
            bucket: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            iam_role: None,
            account_id: None,
            store_dir: default_store_dir_at(project_root),
        }
    }

    /// Bucket and namespace, or [`ConfigError::MissingSetting`] without a bucket.
    pub fn remote_target(&self) -> Result<RemoteTarget, ConfigError> {
        let bucket = self
            .bucket
            .clone()
            .filter(|b| !b.is_empty())
            .ok_or(ConfigError::MissingSetting { key: ENV_BUCKET })?;
        Ok(RemoteTarget {
            bucket,
            namespace: self.namespace.clone(),
        })
    }

    /// IAM role written into new job configurations.
    pub fn iam_role(&self) -> Result<&str, ConfigError> {
        self.iam_role
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::MissingSetting { key: ENV_IAM_ROLE })
    }

    /// Checks the settings every remote-facing command depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.remote_target()?;
        self.iam_role()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Resolve configuration for the project at `project_root` using the process
/// environment.
pub fn load_at(project_root: &Path) -> Result<GantryConfig, ConfigError> {
    load_with_env_at(project_root, |key| std::env::var(key).ok())
}

/// Resolve configuration with an explicit environment lookup; used in tests.
pub fn load_with_env_at(
    project_root: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GantryConfig, ConfigError> {
    let file = read_file_config_at(project_root)?.unwrap_or_default();
    let dotenv = read_dotenv_at(project_root)?;
    let lookup = |key: &str| env(key).or_else(|| dotenv.get(key).cloned());

    let mut config = GantryConfig::defaults_at(project_root);
    if let Some(bucket) = file.bucket {
        config.bucket = Some(bucket);
    }
    if let Some(namespace) = file.namespace {
        config.namespace = namespace;
    }
    if let Some(role) = file.iam_role {
        config.iam_role = Some(role);
    }
    if let Some(account) = file.account_id {
        config.account_id = Some(account);
    }
    if let Some(dir) = file.store_dir {
        config.store_dir = resolve_relative(project_root, dir);
    }

    if let Some(bucket) = lookup(ENV_BUCKET) {
        config.bucket = Some(bucket);
    }
    if let Some(namespace) = lookup(ENV_NAMESPACE) {
        if namespace.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: ENV_NAMESPACE,
                value: namespace,
                reason: "namespace must not be empty".to_string(),
            });
        }
        config.namespace = namespace;
    }
    if let Some(role) = lookup(ENV_IAM_ROLE) {
        config.iam_role = Some(role);
    }
    if let Some(account) = lookup(ENV_ACCOUNT) {
        let parsed = account
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidSetting {
                key: ENV_ACCOUNT,
                value: account.clone(),
                reason: e.to_string(),
            })?;
        config.account_id = Some(parsed);
    }
    if let Some(dir) = lookup(ENV_STORE_DIR) {
        config.store_dir = resolve_relative(project_root, PathBuf::from(dir));
    }

    Ok(config)
}

/// Parse `<root>/gantry.yaml`, or `None` if it does not exist.
pub fn read_file_config_at(project_root: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let path = project_root.join(PROJECT_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Some(FileConfig::default()));
    }
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse { path, source })
}

/// Variables defined in `<root>/.env`; empty if the file does not exist.
pub fn read_dotenv_at(project_root: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let path = project_root.join(DOTENV_FILE);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let dotenv_err = |source| ConfigError::Dotenv {
        path: path.clone(),
        source,
    };
    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(&path).map_err(dotenv_err)? {
        let (key, value) = item.map_err(dotenv_err)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn resolve_relative(project_root: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        dir
    } else {
        project_root.join(dir)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
