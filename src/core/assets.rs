//! Static asset collection.
//!
//! Assets ship inside the binary and are copied to the static root at
//! startup so the server can serve them from disk.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, StoreError};

/// A file bundled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct Asset {
    /// Path relative to the static root.
    pub name: &'static str,
    pub contents: &'static [u8],
}

/// Assets bundled from `static/`.
pub const ASSETS: &[Asset] = &[
    Asset {
        name: "index.html",
        contents: include_bytes!("../../static/index.html"),
    },
    Asset {
        name: "soloist.css",
        contents: include_bytes!("../../static/soloist.css"),
    },
];

/// Outcome of a collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub copied: usize,
    pub unchanged: usize,
}

/// Copy the bundled assets into `root`.
///
/// # Errors
///
/// Returns `StoreError` if a directory or file cannot be written.
pub fn collect(root: &Path) -> Result<CollectSummary> {
    collect_assets(root, ASSETS)
}

/// Copy `assets` into `root`, skipping files whose contents already match.
///
/// Idempotent and never prompts.
pub fn collect_assets(root: &Path, assets: &[Asset]) -> Result<CollectSummary> {
    let mut summary = CollectSummary::default();

    for asset in assets {
        let target = root.join(asset.name);

        if std::fs::read(&target).is_ok_and(|existing| existing == asset.contents) {
            summary.unchanged += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&target, asset.contents).map_err(|source| StoreError::Write {
            path: target.clone(),
            source,
        })?;

        debug!(asset = asset.name, "collected");
        summary.copied += 1;
    }

    Ok(summary)
}
