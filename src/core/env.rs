//! `.env` file reading and writing.
//!
//! Parsing is lenient: blank lines, `#` comments and lines without `=` are
//! skipped so one bad line never blocks startup. Output is sorted by name.

use std::collections::BTreeMap;
#[cfg(unix)]
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Parsed `NAME=VALUE` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: BTreeMap<String, String>,
    skipped: usize,
}

impl EnvFile {
    /// Parse `.env` text.
    ///
    /// Later duplicates win, matching how shells source such files.
    pub fn parse(contents: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut skipped = 0;

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    entries.insert(key.trim().to_string(), parse_env_value(value.trim()));
                }
                _ => {
                    warn!(line = number + 1, "skipping malformed line in env file");
                    skipped += 1;
                }
            }
        }

        Self { entries, skipped }
    }

    /// Load an env file, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "env file not found");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(Self::parse(&contents)))
    }

    /// Render with the given comment header, one sorted entry per line.
    pub fn render(&self, header: &[&str]) -> String {
        let mut output = String::new();

        for line in header {
            output.push_str(line);
            output.push('\n');
        }
        if !header.is_empty() {
            output.push('\n');
        }

        for (key, value) in &self.entries {
            if needs_quotes(value) {
                output.push_str(&format!("{}=\"{}\"\n", key, escape_env_value(value)));
            } else {
                output.push_str(&format!("{}={}\n", key, value));
            }
        }

        output
    }

    /// Write to disk, readable by the owner only.
    ///
    /// Creates the parent directory tree if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CreateDir` or `StoreError::Write`; both are fatal.
    pub fn save(&self, path: &Path, header: &[&str]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = self.render(header);
        write_private(path, content.as_bytes()).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), entries = self.entries.len(), "env file written");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }

    /// Number of malformed lines dropped while parsing.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(content)?;
        file.sync_all()?;

        // mode() only applies on creation.
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content)?;
    }

    Ok(())
}

fn parse_env_value(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return unescape_double_quoted(&raw[1..raw.len() - 1]);
    }

    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }

    raw.to_string()
}

fn unescape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.chars().any(char::is_whitespace)
        || value.contains(['#', '"', '\'', '\\'])
}

fn escape_env_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }

    escaped
}
