//! Canonical paths inside a bundle.

use crate::{BUNDLE_EXTENSION, MANIFEST_FILE};
use std::path::{Path, PathBuf};

/// Scripts folder name.
pub const LIB_FOLDER: &str = "lib";
/// Documentation folder name.
pub const HTML_FOLDER: &str = "html";
/// Resources folder name.
pub const RESOURCES_FOLDER: &str = "resources";
/// License side file name.
pub const LICENSE_FILE: &str = "license";
/// Requirements side file name.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";
/// Integrity marker file name.
pub const HASH_FILE: &str = ".hash";
/// Documentation entry point.
pub const HTML_INDEX_FILE: &str = "index.html";

/// Paths derived from a bundle root.
///
/// A layout is a plain value: it never touches the disk and is rebuilt
/// whenever the bundle root changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    root: PathBuf,
}

impl PathLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lib_folder(&self) -> PathBuf {
        self.root.join(LIB_FOLDER)
    }

    pub fn html_folder(&self) -> PathBuf {
        self.root.join(HTML_FOLDER)
    }

    pub fn resources_folder(&self) -> PathBuf {
        self.root.join(RESOURCES_FOLDER)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn license_path(&self) -> PathBuf {
        self.root.join(LICENSE_FILE)
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.root.join(REQUIREMENTS_FILE)
    }

    pub fn hash_path(&self) -> PathBuf {
        self.root.join(HASH_FILE)
    }

    pub fn html_index_path(&self) -> PathBuf {
        self.html_folder().join(HTML_INDEX_FILE)
    }

    /// Final path component of the root, e.g. `"demo.roboFontExt"`.
    pub fn file_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the root carries the `.roboFontExt` suffix.
    pub fn has_package_extension(&self) -> bool {
        has_package_extension(&self.root)
    }
}

pub(crate) fn has_package_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy() == BUNDLE_EXTENSION)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn PathLayout___derives_fixed_segments() {
        let layout = PathLayout::new("root/fileName");

        assert_eq!(layout.root(), Path::new("root/fileName"));
        assert_eq!(layout.lib_folder(), Path::new("root/fileName/lib"));
        assert_eq!(layout.html_folder(), Path::new("root/fileName/html"));
        assert_eq!(layout.resources_folder(), Path::new("root/fileName/resources"));
        assert_eq!(layout.manifest_path(), Path::new("root/fileName/info.plist"));
        assert_eq!(layout.license_path(), Path::new("root/fileName/license"));
        assert_eq!(
            layout.requirements_path(),
            Path::new("root/fileName/requirements.txt")
        );
        assert_eq!(layout.hash_path(), Path::new("root/fileName/.hash"));
        assert_eq!(
            layout.html_index_path(),
            Path::new("root/fileName/html/index.html")
        );
    }

    #[test]
    fn PathLayout___file_name___returns_last_component() {
        let layout = PathLayout::new("/tmp/build/demo.roboFontExt");

        assert_eq!(layout.file_name(), "demo.roboFontExt");
    }

    #[test]
    fn PathLayout___has_package_extension___checks_suffix() {
        assert!(PathLayout::new("a/demo.roboFontExt").has_package_extension());
        assert!(!PathLayout::new("a/demo.roboFontExtension").has_package_extension());
        assert!(!PathLayout::new("a/demo.robofontext").has_package_extension());
        assert!(!PathLayout::new("a/demo").has_package_extension());
    }

    #[test]
    fn PathLayout___new_root___never_reuses_old_paths() {
        let first = PathLayout::new("one.roboFontExt");
        let second = PathLayout::new("two.roboFontExt");

        assert_ne!(first.lib_folder(), second.lib_folder());
        assert_ne!(first, second);
    }
}
