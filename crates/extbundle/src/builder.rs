//! Bundle creation utilities.
//!
//! The [`BundleBuilder`] provides a fluent API for writing `.roboFontExt`
//! bundle directories. [`crate::Bundle::save`] runs the same pipeline.

use crate::bundle::Bundle;
use crate::config::BundleConfig;
use crate::hash::IntegrityHasher;
use crate::layout::{PathLayout, has_package_extension};
use crate::validate::ValidationReport;
use crate::{BUNDLE_EXTENSION, BundleError, BundleResult, Manifest};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Staging directory prefix, created next to the destination.
const STAGING_PREFIX: &str = ".staging-";

/// Folders copied into a bundle when it is saved.
///
/// Unset folders fall back to the folders of the bundle's current root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFolders {
    pub lib: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub resources: Option<PathBuf>,
}

impl SourceFolders {
    pub fn new(lib: impl Into<PathBuf>) -> Self {
        Self {
            lib: Some(lib.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_html(mut self, html: impl Into<PathBuf>) -> Self {
        self.html = Some(html.into());
        self
    }

    #[must_use]
    pub fn with_resources(mut self, resources: impl Into<PathBuf>) -> Self {
        self.resources = Some(resources.into());
        self
    }
}

/// Builder for writing extension bundles.
///
/// # Example
///
/// ```no_run
/// use extbundle::{BundleBuilder, Manifest};
///
/// let manifest = Manifest::new("myExtension", "1.0");
/// let (bundle, report) = BundleBuilder::new(manifest)
///     .lib_folder("source/lib")
///     .html_folder("source/html")
///     .license("MIT")
///     .write("build/myExtension.roboFontExt")?;
///
/// println!("{report}");
/// # let _ = bundle;
/// # Ok::<(), extbundle::BundleError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    manifest: Manifest,
    folders: SourceFolders,
    config: BundleConfig,
}

impl BundleBuilder {
    /// Create a new bundle builder with the given manifest.
    #[must_use]
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            folders: SourceFolders::default(),
            config: BundleConfig::default(),
        }
    }

    /// Scripts folder copied to `lib/`. Required.
    #[must_use]
    pub fn lib_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.folders.lib = Some(path.into());
        self
    }

    /// Documentation folder copied to `html/`.
    #[must_use]
    pub fn html_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.folders.html = Some(path.into());
        self
    }

    /// Resources folder copied to `resources/`.
    #[must_use]
    pub fn resources_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.folders.resources = Some(path.into());
        self
    }

    #[must_use]
    pub fn license(mut self, text: impl Into<String>) -> Self {
        self.manifest.license = text.into();
        self
    }

    #[must_use]
    pub fn requirements(mut self, text: impl Into<String>) -> Self {
        self.manifest.requirements = text.into();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: BundleConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the current manifest (for inspection).
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Get a mutable reference to the manifest (for modification).
    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Write the bundle to `dest`, returning it bound to `dest` together
    /// with the validation report of the written tree.
    pub fn write(self, dest: impl AsRef<Path>) -> BundleResult<(Bundle, ValidationReport)> {
        let mut bundle = Bundle::new(self.manifest);
        let report = bundle.save_with(dest, &self.folders, &self.config)?;
        Ok((bundle, report))
    }
}

/// Stage a complete bundle tree next to `dest`, then replace `dest` with it.
///
/// `manifest` receives the fresh timestamp and the hash marker (cleared when
/// no expiry date is set) once `dest` has been replaced, and is left as it was
/// on failure. `dest` is never left partially written.
pub(crate) fn save_tree(
    manifest: &mut Manifest,
    bound_root: Option<&Path>,
    dest: &Path,
    folders: &SourceFolders,
    config: &BundleConfig,
) -> BundleResult<()> {
    check_preconditions(bound_root, dest)?;

    let current = bound_root.map(PathLayout::new);
    let lib = folders
        .lib
        .clone()
        .or_else(|| current.as_ref().map(PathLayout::lib_folder))
        .filter(|path| path.is_dir())
        .ok_or_else(|| BundleError::Precondition("lib folder is required to save".to_string()))?;
    let html = existing_folder(&folders.html, current.as_ref().map(PathLayout::html_folder));
    let resources = existing_folder(
        &folders.resources,
        current.as_ref().map(PathLayout::resources_folder),
    );

    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)?;
    let staged = PathLayout::new(staging.path().join("bundle"));
    debug!(staging = %staging.path().display(), "staging bundle");

    copy_tree(&lib, &staged.lib_folder())?;
    if let Some(html) = &html {
        copy_tree(html, &staged.html_folder())?;
    }
    if let Some(resources) = &resources {
        copy_tree(resources, &staged.resources_folder())?;
    }

    let mut saved = manifest.clone();
    saved.timestamp = Some(Utc::now().timestamp_micros() as f64 / 1_000_000.0);
    fs::write(staged.manifest_path(), saved.serialize()?)?;
    if !saved.license.is_empty() {
        fs::write(staged.license_path(), &saved.license)?;
    }
    if !saved.requirements.is_empty() {
        fs::write(staged.requirements_path(), &saved.requirements)?;
    }

    saved.hash = if saved.has_expire_date() {
        let hash = IntegrityHasher::from_config(config).digest(staged.root())?;
        fs::write(staged.hash_path(), &hash)?;
        debug!(%hash, "wrote hash marker");
        Some(hash)
    } else {
        None
    };

    if dest.is_dir() {
        fs::remove_dir_all(dest)?;
    } else if dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(staged.root(), dest)?;
    *manifest = saved;

    info!(dest = %dest.display(), "saved bundle");
    Ok(())
}

fn check_preconditions(bound_root: Option<&Path>, dest: &Path) -> BundleResult<()> {
    if !has_package_extension(dest) {
        return Err(BundleError::Precondition(format!(
            "destination must have the `.{BUNDLE_EXTENSION}` suffix: {}",
            dest.display()
        )));
    }
    if bound_root.is_some_and(|root| same_path(root, dest)) {
        return Err(BundleError::Precondition(format!(
            "cannot overwrite the bundle's own location: {}",
            dest.display()
        )));
    }
    Ok(())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn existing_folder(explicit: &Option<PathBuf>, fallback: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .clone()
        .filter(|path| path.is_dir())
        .or_else(|| fallback.filter(|path| path.is_dir()))
}

/// Recursively copy the contents of `src` into `dst`.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> BundleResult<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            BundleError::Config(format!("{} is outside of {}", entry.path().display(), src.display()))
        })?;
        let target = dst.join(relative);
        if entry.path().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.path().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
