//! Installed bundles.
//!
//! The [`Registry`] trait answers "which version of X is installed", which is
//! all requirement resolution needs. [`FolderRegistry`] implements it over a
//! folder of `.roboFontExt` bundles and adds batch validation.

use crate::validate::{ValidationReport, Validator};
use crate::{BUNDLE_EXTENSION, Bundle, BundleResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the error log written by [`write_error_log`].
pub const ERROR_LOG_FILE: &str = "_errors.txt";

/// Lookup of installed bundle versions by bundle name.
pub trait Registry {
    fn installed_version(&self, name: &str) -> Option<String>;
}

impl Registry for BTreeMap<String, String> {
    fn installed_version(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<S: BuildHasher> Registry for HashMap<String, String, S> {
    fn installed_version(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A folder holding installed bundles, one `<name>.roboFontExt` per bundle.
#[derive(Debug, Clone)]
pub struct FolderRegistry {
    root: PathBuf,
}

impl FolderRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the bundle named `name` is, or would be, installed.
    #[must_use]
    pub fn bundle_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{BUNDLE_EXTENSION}"))
    }

    /// File names of the installed bundles, ordered case-insensitively.
    ///
    /// A missing folder has no bundles.
    pub fn bundles(&self) -> BundleResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if is_bundle_path(&path)
                && let Some(name) = path.file_name()
            {
                names.push(name.to_string_lossy().into_owned());
            }
        }
        names.sort_by_cached_key(|name| name.to_lowercase());
        Ok(names)
    }

    /// Validate every bundle below the folder, nested ones included.
    ///
    /// Bundles that cannot be loaded are reported with the load error.
    pub fn validate_all(&self, validator: &Validator) -> Vec<BundleReport> {
        let mut reports = Vec::new();
        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() || !is_bundle_path(entry.path()) {
                continue;
            }
            walker.skip_current_dir();

            let report = validator.validate_path(entry.path());
            debug!(bundle = %entry.path().display(), errors = report.errors().len(), "checked bundle");
            reports.push(BundleReport {
                name: entry.file_name().to_string_lossy().into_owned(),
                report,
            });
        }
        info!(root = %self.root.display(), bundles = reports.len(), "validated folder");
        reports
    }
}

impl Registry for FolderRegistry {
    fn installed_version(&self, name: &str) -> Option<String> {
        let path = self.bundle_path(name);
        if !path.is_dir() {
            return None;
        }
        match Bundle::load(&path) {
            Ok(bundle) => bundle.manifest.version.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(bundle = %path.display(), error = %err, "installed bundle is unreadable");
                None
            }
        }
    }
}

/// Suffix match ignoring ASCII case, as installed folders are named by hand.
fn is_bundle_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(BUNDLE_EXTENSION))
}

/// Validation outcome of one bundle in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    /// Bundle file name, e.g. `"demo.roboFontExt"`.
    pub name: String,
    pub report: ValidationReport,
}

/// Render the failing bundles of a batch: the bundle name, its errors
/// indented by a tab, then a blank line.
#[must_use]
pub fn error_log(reports: &[BundleReport]) -> String {
    let mut lines = Vec::new();
    for entry in reports.iter().filter(|entry| !entry.report.is_ok()) {
        lines.push(entry.name.clone());
        lines.extend(entry.report.errors().iter().map(|error| format!("\t{error}")));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Write [`error_log`] to `<folder>/_errors.txt`, returning its path.
///
/// Nothing is written when every bundle passed.
pub fn write_error_log(folder: &Path, reports: &[BundleReport]) -> BundleResult<Option<PathBuf>> {
    let log = error_log(reports);
    if log.is_empty() {
        return Ok(None);
    }
    let path = folder.join(ERROR_LOG_FILE);
    fs::write(&path, log)?;
    info!(path = %path.display(), "wrote validation error log");
    Ok(Some(path))
}

#[cfg(test)]
#[path = "registry/registry_tests.rs"]
mod registry_tests;
