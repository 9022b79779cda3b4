//! Secret provisioning.
//!
//! Loads the secrets file of a data directory and generates any required
//! secret that is missing. Existing values are never regenerated.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use zeroize::{Zeroize, Zeroizing};

use crate::core::constants::{ENV_FILE_HEADER, REQUIRED_SECRETS};
use crate::core::env::EnvFile;
use crate::error::Result;

/// Named secret values, sorted by name.
///
/// Values are wiped from memory when the record is dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretRecord {
    values: BTreeMap<String, String>,
}

impl SecretRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for SecretRecord {
    fn drop(&mut self) {
        for value in self.values.values_mut() {
            value.zeroize();
        }
    }
}

/// Result of [`load_or_provision`].
#[derive(Debug)]
pub struct Provisioned {
    pub record: SecretRecord,
    /// Names generated during this call.
    pub generated: BTreeSet<String>,
}

/// Load the secrets file at `path`, generating any missing required secret.
///
/// The merged record is always written back, sorted and with the warning
/// header, so a second call against the same file is byte-identical.
///
/// # Errors
///
/// Returns `StoreError` if the file cannot be read or written. A write
/// failure is fatal.
pub fn load_or_provision(path: &Path) -> Result<Provisioned> {
    load_or_provision_with(path, REQUIRED_SECRETS)
}

/// Like [`load_or_provision`] with an explicit set of required names and
/// their entropy in bytes.
pub fn load_or_provision_with(path: &Path, required: &[(&str, usize)]) -> Result<Provisioned> {
    let mut file = EnvFile::load(path)?.unwrap_or_default();
    debug!(
        path = %path.display(),
        existing = file.len(),
        skipped = file.skipped(),
        "loaded secrets file"
    );

    let mut generated = BTreeSet::new();
    for (name, bytes) in required {
        if file.contains(name) {
            continue;
        }
        file.insert(*name, generate_token(*bytes).as_str());
        generated.insert((*name).to_string());
        info!(name, "generated secret");
    }

    file.save(path, ENV_FILE_HEADER)?;

    Ok(Provisioned {
        record: SecretRecord {
            values: file.into_entries(),
        },
        generated,
    })
}

/// Generate a URL-safe, unpadded random token from `bytes` bytes of OS entropy.
pub fn generate_token(bytes: usize) -> Zeroizing<String> {
    let mut raw = Zeroizing::new(vec![0u8; bytes]);
    OsRng.fill_bytes(&mut raw);
    Zeroizing::new(URL_SAFE_NO_PAD.encode(raw.as_slice()))
}
