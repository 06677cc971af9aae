//! Tamper-evident content digest over a bundle tree.
//!
//! The digest covers every regular file except the `.hash` marker itself and
//! Finder noise (`Icon\r`, `*.DS_Store`). Files are folded in the order of
//! their `/`-joined path relative to the bundle root, so the result does not
//! depend on directory enumeration order, modification times or permissions.

use crate::config::BundleConfig;
use crate::layout::{HASH_FILE, PathLayout};
use crate::manifest::{Manifest, parse_expire_date};
use crate::{BundleError, BundleResult};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Finder custom-icon sentinel file.
const ICON_SENTINEL: &str = "Icon\r";
/// Finder metadata suffix.
const DS_STORE_SUFFIX: &str = ".DS_Store";

/// Outcome of an install-time integrity check that did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// A `.hash` marker exists but no expiry date is declared.
    #[error("Not a valid extension: missing expireDate")]
    MissingExpireDate,

    /// An expiry date is declared but the `.hash` marker is absent.
    #[error("Not a valid extension: missing hash")]
    MissingHash,

    /// The stored digest differs from the digest of the tree on disk.
    #[error("Not a valid extension: hash does not match")]
    HashMismatch,

    /// The expiry date has passed.
    #[error("Extension is expired ({date})")]
    Expired { date: String },

    /// The expiry date is not a `YYYY-MM-DD` date.
    #[error("expire date is not set in the correct format: 'YYYY-MM-DD', got `{value}`")]
    InvalidExpireDate { value: String },

    /// The tree could not be read while computing the digest.
    #[error("Could not compute bundle hash: {0}")]
    Unreadable(String),
}

/// Computes bundle digests.
#[derive(Debug, Clone)]
pub struct IntegrityHasher {
    passphrase: String,
    chunk_size: usize,
}

impl Default for IntegrityHasher {
    fn default() -> Self {
        Self::from_config(&BundleConfig::default())
    }
}

impl IntegrityHasher {
    /// Create a hasher seeded with `passphrase` (may be empty).
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            chunk_size: BundleConfig::default().hash_chunk_size,
        }
    }

    pub fn from_config(config: &BundleConfig) -> Self {
        Self::new(config.hash_passphrase.clone()).with_chunk_size(config.hash_chunk_size)
    }

    /// Set the read buffer size. The digest does not depend on it.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Digest the tree rooted at `root` as lowercase hex.
    pub fn digest(&self, root: &Path) -> BundleResult<String> {
        let mut files = collect_files(root)?;
        sort_by_relative_path(&mut files);

        let mut hasher = Sha256::new();
        hasher.update(self.passphrase.as_bytes());

        let mut buf = vec![0u8; self.chunk_size];
        for (relative, path) in &files {
            hasher.update(Sha256::digest(relative.as_bytes()));
            let mut file = File::open(path)?;
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
        }

        let digest = hex::encode(hasher.finalize());
        debug!(root = %root.display(), files = files.len(), "computed bundle hash");
        Ok(digest)
    }
}

/// Regular files under `root` paired with their `/`-joined relative path,
/// in filesystem enumeration order.
pub(crate) fn collect_files(root: &Path) -> BundleResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_excluded(&name) {
            continue;
        }
        let relative = relative_key(root, path)?;
        files.push((relative, path.to_path_buf()));
    }
    Ok(files)
}

/// Order files by relative path. Enumeration order is never trusted.
pub(crate) fn sort_by_relative_path(files: &mut [(String, PathBuf)]) {
    files.sort_by(|a, b| a.0.cmp(&b.0));
}

fn is_excluded(name: &str) -> bool {
    name == HASH_FILE || name == ICON_SENTINEL || name.ends_with(DS_STORE_SUFFIX)
}

fn relative_key(root: &Path, path: &Path) -> BundleResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        BundleError::Config(format!(
            "{} is outside of {}",
            path.display(),
            root.display()
        ))
    })?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

/// Check the `.hash` marker and expiry date of a bundle on disk.
///
/// Bundles without both a marker and an expiry date pass. Otherwise the
/// checks run in order: missing expiry date, missing marker, digest
/// mismatch, then expiry. A bundle expires at the start of its expiry date.
pub fn verify_integrity(
    layout: &PathLayout,
    manifest: &Manifest,
    hasher: &IntegrityHasher,
    today: NaiveDate,
) -> Result<(), IntegrityError> {
    let hash_path = layout.hash_path();
    let has_marker = hash_path.is_file();
    let expire_date = manifest.expire_date.as_deref().filter(|d| !d.is_empty());

    if !has_marker && expire_date.is_none() {
        return Ok(());
    }
    let Some(expire_date) = expire_date else {
        warn!(bundle = %layout.file_name(), "hash marker without expireDate");
        return Err(IntegrityError::MissingExpireDate);
    };
    if !has_marker {
        warn!(bundle = %layout.file_name(), "expireDate without hash marker");
        return Err(IntegrityError::MissingHash);
    }

    let stored = fs::read_to_string(&hash_path)
        .map_err(|e| IntegrityError::Unreadable(e.to_string()))?;
    let actual = hasher
        .digest(layout.root())
        .map_err(|e| IntegrityError::Unreadable(e.to_string()))?;
    if stored.trim() != actual {
        warn!(bundle = %layout.file_name(), "hash does not match");
        return Err(IntegrityError::HashMismatch);
    }

    let expires = parse_expire_date(expire_date).ok_or_else(|| IntegrityError::InvalidExpireDate {
        value: expire_date.to_string(),
    })?;
    if expires <= today {
        warn!(bundle = %layout.file_name(), %expires, "extension is expired");
        return Err(IntegrityError::Expired {
            date: expire_date.to_string(),
        });
    }
    Ok(())
}
