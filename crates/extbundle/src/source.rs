//! Editable source trees.
//!
//! [`unpack`] turns a bundle into a folder that is easy to keep under version
//! control, and [`pack`] builds a bundle back from it:
//!
//! ```text
//! <folder>/
//!   info.yaml     manifest keys
//!   build.yaml    build recipe
//!   source/lib, source/html, source/resources
//! ```

use crate::builder::{SourceFolders, copy_tree};
use crate::bundle::Bundle;
use crate::config::BundleConfig;
use crate::manifest::KEY_VERSION;
use crate::validate::ValidationReport;
use crate::{BUNDLE_EXTENSION, BundleError, BundleResult, Manifest};
use plist::{Dictionary, Value};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Number, Value as Yaml};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Manifest file of a source tree.
pub const INFO_FILE: &str = "info.yaml";
/// Build recipe file of a source tree.
pub const BUILD_FILE: &str = "build.yaml";

const SOURCE_LIB: &str = "source/lib";
const SOURCE_HTML: &str = "source/html";
const SOURCE_RESOURCES: &str = "source/resources";

/// Contents of `build.yaml`. Folder paths are relative to the source root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecipe {
    pub lib_folder: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_folder: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_folder: Option<PathBuf>,
    /// Output bundle path; defaults to `<name>.roboFontExt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
}

impl BuildRecipe {
    /// Source folders resolved against `root`.
    pub fn folders(&self, root: &Path) -> SourceFolders {
        SourceFolders {
            lib: Some(root.join(&self.lib_folder)),
            html: self.html_folder.as_ref().map(|path| root.join(path)),
            resources: self.resources_folder.as_ref().map(|path| root.join(path)),
        }
    }
}

/// Write the source tree of a saved bundle into `dest`.
///
/// `dest` is replaced if it exists. It may not be the bundle itself or a
/// folder containing it.
pub fn unpack(bundle: &Bundle, dest: &Path) -> BundleResult<()> {
    let layout = bundle.layout()?;
    if contains_path(dest, layout.root()) {
        return Err(BundleError::Precondition(format!(
            "cannot unpack into a folder holding the bundle: {}",
            dest.display()
        )));
    }
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;

    let info = plist_to_yaml(&bundle.manifest.to_value());
    fs::write(dest.join(INFO_FILE), serde_yaml::to_string(&info)?)?;

    let mut recipe = BuildRecipe {
        lib_folder: PathBuf::from(SOURCE_LIB),
        license: non_empty(&bundle.manifest.license),
        requirements: non_empty(&bundle.manifest.requirements),
        ..BuildRecipe::default()
    };
    copy_tree(&layout.lib_folder(), &dest.join(SOURCE_LIB))?;
    if layout.html_folder().is_dir() {
        copy_tree(&layout.html_folder(), &dest.join(SOURCE_HTML))?;
        recipe.html_folder = Some(PathBuf::from(SOURCE_HTML));
    }
    if layout.resources_folder().is_dir() {
        copy_tree(&layout.resources_folder(), &dest.join(SOURCE_RESOURCES))?;
        recipe.resources_folder = Some(PathBuf::from(SOURCE_RESOURCES));
    }
    fs::write(dest.join(BUILD_FILE), serde_yaml::to_string(&recipe)?)?;

    info!(bundle = %layout.file_name(), dest = %dest.display(), "unpacked bundle");
    Ok(())
}

/// Build a bundle from the source tree at `root`.
pub fn pack(root: impl AsRef<Path>) -> BundleResult<(Bundle, ValidationReport)> {
    pack_with(root, &BundleConfig::default())
}

pub fn pack_with(
    root: impl AsRef<Path>,
    config: &BundleConfig,
) -> BundleResult<(Bundle, ValidationReport)> {
    let root = root.as_ref();
    let info_path = root.join(INFO_FILE);
    if !info_path.is_file() {
        return Err(BundleError::MissingManifest(info_path.display().to_string()));
    }
    let info: Yaml = serde_yaml::from_str(&fs::read_to_string(&info_path)?)?;
    let recipe: BuildRecipe = serde_yaml::from_str(&fs::read_to_string(root.join(BUILD_FILE))?)?;

    let mut value = yaml_to_plist(&info).unwrap_or_else(|| Value::Dictionary(Dictionary::new()));
    if let Some(dict) = value.as_dictionary_mut() {
        coerce_version(dict);
    }
    let mut manifest = Manifest::from_value(value)?;
    manifest.license = recipe.license.clone().unwrap_or_default();
    manifest.requirements = recipe.requirements.clone().unwrap_or_default();

    let dest = match &recipe.path {
        Some(path) => root.join(path),
        None => root.join(format!(
            "{}.{BUNDLE_EXTENSION}",
            manifest.required_name()?
        )),
    };
    debug!(dest = %dest.display(), "packing source tree");

    let mut bundle = Bundle::new(manifest);
    let report = bundle.save_with(&dest, &recipe.folders(root), config)?;
    Ok((bundle, report))
}

/// Whether `outer` is `inner` or one of its ancestors.
fn contains_path(outer: &Path, inner: &Path) -> bool {
    match (outer.canonicalize(), inner.canonicalize()) {
        (Ok(outer), Ok(inner)) => inner.starts_with(outer),
        _ => inner.starts_with(outer),
    }
}

/// YAML reads `version: 1.0` as a number; the manifest wants text.
fn coerce_version(dict: &mut Dictionary) {
    let text = match dict.get(KEY_VERSION) {
        Some(Value::Integer(number)) => number.to_string(),
        Some(Value::Real(number)) => format!("{number:?}"),
        _ => return,
    };
    dict.insert(KEY_VERSION.to_string(), Value::String(text));
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

fn plist_to_yaml(value: &Value) -> Yaml {
    match value {
        Value::String(text) => Yaml::String(text.clone()),
        Value::Boolean(flag) => Yaml::Bool(*flag),
        Value::Integer(number) => match (number.as_signed(), number.as_unsigned()) {
            (Some(n), _) => Yaml::Number(Number::from(n)),
            (None, Some(n)) => Yaml::Number(Number::from(n)),
            (None, None) => Yaml::Null,
        },
        Value::Real(number) => Yaml::Number(Number::from(*number)),
        Value::Date(date) => Yaml::String(date.to_xml_format()),
        Value::Data(bytes) => Yaml::String(hex::encode(bytes)),
        Value::Array(items) => Yaml::Sequence(items.iter().map(plist_to_yaml).collect()),
        Value::Dictionary(dict) => {
            let mut mapping = Mapping::new();
            for (key, value) in dict {
                mapping.insert(Yaml::String(key.clone()), plist_to_yaml(value));
            }
            Yaml::Mapping(mapping)
        }
        _ => Yaml::Null,
    }
}

/// Convert YAML to a property list value. Nulls have no property list form
/// and are dropped.
fn yaml_to_plist(value: &Yaml) -> Option<Value> {
    match value {
        Yaml::Null => None,
        Yaml::Bool(flag) => Some(Value::Boolean(*flag)),
        Yaml::Number(number) => {
            if let Some(n) = number.as_i64() {
                Some(Value::Integer(n.into()))
            } else if let Some(n) = number.as_u64() {
                Some(Value::Integer(n.into()))
            } else {
                number.as_f64().map(Value::Real)
            }
        }
        Yaml::String(text) => Some(Value::String(text.clone())),
        Yaml::Sequence(items) => Some(Value::Array(items.iter().filter_map(yaml_to_plist).collect())),
        Yaml::Mapping(mapping) => {
            let mut dict = Dictionary::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(text) => text.clone(),
                    Yaml::Number(number) => number.to_string(),
                    Yaml::Bool(flag) => flag.to_string(),
                    _ => continue,
                };
                if let Some(value) = yaml_to_plist(value) {
                    dict.insert(key, value);
                }
            }
            Some(Value::Dictionary(dict))
        }
        Yaml::Tagged(tagged) => yaml_to_plist(&tagged.value),
    }
}
