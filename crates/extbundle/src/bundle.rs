//! Bundle loading and the operations of a bundle bound to disk.
//!
//! A [`Bundle`] pairs a [`Manifest`] with an optional root folder. Bundles
//! created in memory are unbound until their first save.

use crate::builder::{SourceFolders, save_tree};
use crate::config::BundleConfig;
use crate::hash::{IntegrityHasher, collect_files, sort_by_relative_path, verify_integrity};
use crate::menu::{MenuBuilder, ResolvedMenuEntry, ShortKey};
use crate::validate::{ValidationReport, Validator};
use crate::{BundleError, BundleResult, Manifest, PathLayout, source};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An extension bundle.
///
/// # Example
///
/// ```no_run
/// use extbundle::Bundle;
///
/// let bundle = Bundle::load("Demo.roboFontExt")?;
/// let report = bundle.validate()?;
/// if !report.is_ok() {
///     eprintln!("{report}");
/// }
/// # Ok::<(), extbundle::BundleError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    root: Option<PathBuf>,
    pub manifest: Manifest,
}

impl Bundle {
    /// Create an unbound bundle.
    #[must_use]
    pub fn new(manifest: Manifest) -> Self {
        Self {
            root: None,
            manifest,
        }
    }

    /// Load the bundle at `root`.
    ///
    /// `license`, `requirements.txt` and `.hash` are optional; missing files
    /// read as empty.
    pub fn load(root: impl AsRef<Path>) -> BundleResult<Self> {
        let layout = PathLayout::new(root.as_ref());
        let manifest_path = layout.manifest_path();
        if !manifest_path.is_file() {
            return Err(BundleError::MissingManifest(
                manifest_path.display().to_string(),
            ));
        }

        let mut manifest = Manifest::deserialize(&fs::read(&manifest_path)?)?;
        manifest.license = read_optional(&layout.license_path())?.unwrap_or_default();
        manifest.requirements = read_optional(&layout.requirements_path())?.unwrap_or_default();
        manifest.hash = read_optional(&layout.hash_path())?;

        debug!(bundle = %layout.file_name(), "loaded bundle");
        Ok(Self {
            root: Some(layout.root().to_path_buf()),
            manifest,
        })
    }

    /// The folder this bundle is bound to, if it has been saved or loaded.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Layout of the bound root.
    pub fn layout(&self) -> BundleResult<PathLayout> {
        self.root
            .as_deref()
            .map(PathLayout::new)
            .ok_or_else(|| BundleError::Config("bundle is not saved on disk".to_string()))
    }

    /// Display name: the manifest name, or the folder name when unnamed.
    #[must_use]
    pub fn name(&self) -> String {
        match self.manifest.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .root
                .as_deref()
                .map(|root| PathLayout::new(root).file_name())
                .unwrap_or_default(),
        }
    }

    /// Validate with the default rules.
    pub fn validate(&self) -> BundleResult<ValidationReport> {
        self.validate_with(&Validator::default())
    }

    pub fn validate_with(&self, validator: &Validator) -> BundleResult<ValidationReport> {
        Ok(validator.validate(&self.manifest, &self.layout()?))
    }

    /// Save the bundle to `dest` and validate the result.
    ///
    /// On success the bundle is bound to `dest`.
    pub fn save(
        &mut self,
        dest: impl AsRef<Path>,
        folders: &SourceFolders,
    ) -> BundleResult<ValidationReport> {
        self.save_with(dest, folders, &BundleConfig::default())
    }

    pub fn save_with(
        &mut self,
        dest: impl AsRef<Path>,
        folders: &SourceFolders,
        config: &BundleConfig,
    ) -> BundleResult<ValidationReport> {
        let dest = dest.as_ref();
        save_tree(
            &mut self.manifest,
            self.root.as_deref(),
            dest,
            folders,
            config,
        )?;
        self.root = Some(dest.to_path_buf());
        self.validate_with(&Validator::new(config))
    }

    /// Write an editable source tree for this bundle into `dest`.
    ///
    /// See [`source::unpack`].
    pub fn unpack(&self, dest: impl AsRef<Path>) -> BundleResult<()> {
        source::unpack(self, dest.as_ref())
    }

    /// Relative paths of every hashed file in the bundle, sorted.
    pub fn list_files(&self) -> BundleResult<Vec<String>> {
        let layout = self.layout()?;
        let mut files = collect_files(layout.root())?;
        sort_by_relative_path(&mut files);
        Ok(files
            .into_iter()
            .map(|(relative, _)| relative)
            .collect())
    }

    /// Menu entries with scripts resolved against the absolute lib folder.
    ///
    /// Entries without a `path` are skipped. A missing title defaults to the
    /// script's file stem.
    pub fn menu_entries(&self) -> BundleResult<Vec<ResolvedMenuEntry>> {
        let lib = std::path::absolute(self.layout()?.lib_folder())?;
        Ok(self
            .manifest
            .add_to_menu
            .iter()
            .filter_map(|entry| {
                let path = entry.path.as_deref()?;
                let script = lib.join(path);
                let preferred_name = entry.preferred_name.clone().unwrap_or_else(|| {
                    script
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default()
                });
                Some(ResolvedMenuEntry {
                    path: script,
                    preferred_name,
                    short_key: entry.short_key.clone().unwrap_or_else(ShortKey::default),
                    nest_in_submenus: entry.nest_in_submenus.is_some_and(|flag| flag.get()),
                })
            })
            .collect())
    }

    /// Hand this bundle's menu entries to the host menu.
    pub fn register_menu(&self, menu: &mut dyn MenuBuilder) -> BundleResult<()> {
        let entries = self.menu_entries()?;
        if !entries.is_empty() {
            menu.add_bundle_menu(&self.name(), &entries);
        }
        Ok(())
    }

    /// Check the hash marker and expiry date as of `today`.
    pub fn verify_integrity(&self, hasher: &IntegrityHasher, today: NaiveDate) -> BundleResult<()> {
        verify_integrity(&self.layout()?, &self.manifest, hasher, today)?;
        Ok(())
    }
}

fn read_optional(path: &Path) -> BundleResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::MenuEntry;
    use tempfile::TempDir;

    fn saved(temp: &TempDir, manifest: Manifest) -> Bundle {
        let lib = temp.path().join("src/lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("tool.py"), "print('hi')\n").unwrap();
        let mut bundle = Bundle::new(manifest);
        bundle
            .save(temp.path().join("out/demo.roboFontExt"), &SourceFolders::new(&lib))
            .unwrap();
        bundle
    }

    #[derive(Default)]
    struct RecordingMenu {
        menus: Vec<(String, Vec<ResolvedMenuEntry>)>,
    }

    impl MenuBuilder for RecordingMenu {
        fn add_bundle_menu(&mut self, bundle_name: &str, entries: &[ResolvedMenuEntry]) {
            self.menus.push((bundle_name.to_string(), entries.to_vec()));
        }
    }

    #[test]
    fn Bundle___new___is_unbound() {
        let bundle = Bundle::new(Manifest::new("demo", "1.0"));

        assert!(bundle.root().is_none());
        assert!(matches!(bundle.layout(), Err(BundleError::Config(_))));
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn Bundle___load___missing_manifest___returns_error() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("empty.roboFontExt");
        fs::create_dir_all(&root).unwrap();

        let err = Bundle::load(&root).unwrap_err();

        assert!(matches!(err, BundleError::MissingManifest(_)));
        assert!(err.to_string().contains("info.plist"));
    }

    #[test]
    fn Bundle___load___garbage_manifest___is_format_error() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("bad.roboFontExt");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("info.plist"), b"not a plist").unwrap();

        let err = Bundle::load(&root).unwrap_err();

        assert!(err.is_format_error());
    }

    #[test]
    fn Bundle___load___reads_side_files() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::new("demo", "1.0");
        manifest.license = "MIT".to_string();
        manifest.requirements = "other\n".to_string();
        saved(&temp, manifest);

        let loaded = Bundle::load(temp.path().join("out/demo.roboFontExt")).unwrap();

        assert_eq!(loaded.manifest.license, "MIT");
        assert_eq!(loaded.manifest.requirements, "other\n");
        assert_eq!(loaded.manifest.hash, None);
    }

    #[test]
    fn Bundle___name___falls_back_to_folder_name() {
        let temp = TempDir::new().unwrap();
        let bundle = saved(&temp, Manifest::new("demo", "1.0"));
        let mut unnamed = bundle.clone();
        unnamed.manifest.name = None;

        assert_eq!(bundle.name(), "demo");
        assert_eq!(unnamed.name(), "demo.roboFontExt");
    }

    #[test]
    fn Bundle___list_files___is_sorted_and_relative() {
        let temp = TempDir::new().unwrap();
        let bundle = saved(&temp, Manifest::new("demo", "1.0"));

        let files = bundle.list_files().unwrap();

        assert_eq!(files, vec!["info.plist", "lib/tool.py"]);
    }

    #[test]
    fn Bundle___menu_entries___resolve_against_lib() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::new("demo", "1.0");
        manifest.add_to_menu = vec![
            MenuEntry::new("tool.py", "Run Tool", ShortKey::Key("t".to_string())),
            MenuEntry {
                path: Some("other.py".to_string()),
                ..MenuEntry::default()
            },
            MenuEntry::default(),
        ];
        let bundle = saved(&temp, manifest);

        let entries = bundle.menu_entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].path.is_absolute());
        assert!(entries[0].path.ends_with("demo.roboFontExt/lib/tool.py"));
        assert_eq!(entries[0].preferred_name, "Run Tool");
        assert_eq!(entries[1].preferred_name, "other");
        assert_eq!(entries[1].short_key, ShortKey::default());
        assert!(!entries[1].nest_in_submenus);
    }

    #[test]
    fn Bundle___register_menu___passes_entries_in_order() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::new("demo", "1.0");
        manifest.add_to_menu = vec![
            MenuEntry::new("b.py", "B", ShortKey::default()),
            MenuEntry::new("a.py", "A", ShortKey::default()),
        ];
        let bundle = saved(&temp, manifest);
        let mut menu = RecordingMenu::default();

        bundle.register_menu(&mut menu).unwrap();

        assert_eq!(menu.menus.len(), 1);
        let (name, entries) = &menu.menus[0];
        assert_eq!(name, "demo");
        let titles: Vec<_> = entries.iter().map(|e| e.preferred_name.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn Bundle___register_menu___without_entries___adds_nothing() {
        let temp = TempDir::new().unwrap();
        let bundle = saved(&temp, Manifest::new("demo", "1.0"));
        let mut menu = RecordingMenu::default();

        bundle.register_menu(&mut menu).unwrap();

        assert!(menu.menus.is_empty());
    }

    #[test]
    fn Bundle___verify_integrity___unsealed_bundle___passes() {
        let temp = TempDir::new().unwrap();
        let bundle = saved(&temp, Manifest::new("demo", "1.0"));
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();

        assert!(bundle.verify_integrity(&IntegrityHasher::default(), today).is_ok());
    }
}
