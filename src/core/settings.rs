//! Runtime configuration.
//!
//! [`RuntimeEnvironment`] is the explicit stand-in for the process
//! environment: captured once at startup, merged with provisioned secrets,
//! and handed to the server process. [`Settings`] is the typed view the
//! server actually runs on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::constants::{
    API_TOKEN_VAR, DATABASE_FILE, DATA_DIR_VAR, DEFAULT_DATA_DIR, SECRET_KEY_VAR, SETTINGS_FILE,
    SETTINGS_VAR, STATIC_DIR,
};
use crate::error::{ConfigError, Result};

/// Environment variables for the server process.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    vars: BTreeMap<String, String>,
}

impl RuntimeEnvironment {
    /// Snapshot the current process environment.
    ///
    /// Variables that are not valid unicode are skipped.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats an empty value as unset.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Set `name` unless it is already present. Returns whether it was set.
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.vars.contains_key(&name) {
            debug!(name = %name, "keeping externally supplied value");
            return false;
        }
        self.vars.insert(name, value.into());
        true
    }

    /// Merge defaults without overriding anything already present.
    ///
    /// Returns the names that were added.
    pub fn merge_defaults<'a>(
        &mut self,
        defaults: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<String> {
        defaults
            .into_iter()
            .filter(|(name, value)| self.set_default(*name, *value))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl std::fmt::Debug for RuntimeEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEnvironment")
            .field("vars", &self.vars.len())
            .finish()
    }
}

/// Resolve the data directory: `SOLOIST_DATA_DIR` if set, else `~/.soloist`.
///
/// Does not create it.
///
/// # Errors
///
/// Returns `ConfigError::NoHomeDir` if no override is set and the home
/// directory is unknown.
pub fn resolve_data_dir(env: &RuntimeEnvironment) -> Result<PathBuf> {
    if let Some(dir) = env.get_non_empty(DATA_DIR_VAR) {
        return Ok(PathBuf::from(dir));
    }

    dirs::home_dir()
        .map(|home| home.join(DEFAULT_DATA_DIR))
        .ok_or_else(|| ConfigError::NoHomeDir.into())
}

/// Default settings file location for a data directory.
pub fn default_settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

/// Optional `settings.toml` contents.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub static_files: StaticSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    /// sqlite file, relative paths resolve against the data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticSection {
    /// Collection target, relative paths resolve against the data directory.
    pub root: Option<PathBuf>,
}

impl SettingsFile {
    /// Load the settings file, falling back to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// A file that exists but cannot be read or parsed is a fatal
    /// `ConfigError`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }
}

/// Resolved server configuration.
pub struct Settings {
    pub data_dir: PathBuf,
    pub secret_key: Zeroizing<String>,
    pub api_token: Option<Zeroizing<String>>,
    pub database_path: PathBuf,
    pub static_root: PathBuf,
}

impl Settings {
    /// Build settings from a runtime environment and its settings file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSecret` if the signing key is missing or
    /// empty, or any error from loading the settings file. A missing API
    /// token is not an error here; requests fail with `NotConfigured`.
    pub fn from_env(env: &RuntimeEnvironment) -> Result<Self> {
        let data_dir = resolve_data_dir(env)?;

        let secret_key = env
            .get_non_empty(SECRET_KEY_VAR)
            .ok_or(ConfigError::MissingSecret(SECRET_KEY_VAR))?;
        let api_token = env
            .get_non_empty(API_TOKEN_VAR)
            .map(|t| Zeroizing::new(t.to_string()));

        let settings_path = env
            .get_non_empty(SETTINGS_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_settings_path(&data_dir));
        let file = SettingsFile::load(&settings_path)?;

        let database_path = resolve_under(&data_dir, file.database.path, DATABASE_FILE);
        let static_root = resolve_under(&data_dir, file.static_files.root, STATIC_DIR);

        Ok(Self {
            data_dir,
            secret_key: Zeroizing::new(secret_key.to_string()),
            api_token,
            database_path,
            static_root,
        })
    }

    /// The configured bearer token, if any.
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref().map(String::as_str)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("data_dir", &self.data_dir)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("database_path", &self.database_path)
            .field("static_root", &self.static_root)
            .finish()
    }
}

fn resolve_under(base: &Path, configured: Option<PathBuf>, default: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path,
        Some(path) => base.join(path),
        None => base.join(default),
    }
}
