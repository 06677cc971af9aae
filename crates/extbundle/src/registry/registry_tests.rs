#![allow(non_snake_case)]

use super::*;
use crate::{BundleBuilder, Manifest, MenuEntry, ShortKey};
use tempfile::TempDir;

fn install(folder: &Path, file_name: &str, name: &str, version: &str) -> PathBuf {
    let lib = folder.join(format!(".src-{name}"));
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("tool.py"), "print('hi')\n").unwrap();

    let mut manifest = Manifest::new(name, version);
    manifest.developer = Some("Jane Doe".to_string());
    manifest.developer_url = Some("https://example.com".to_string());
    manifest.add_to_menu = vec![MenuEntry::new("tool.py", "Tool", ShortKey::default())];

    let dest = folder.join(file_name);
    BundleBuilder::new(manifest)
        .lib_folder(&lib)
        .write(&dest)
        .unwrap();
    fs::remove_dir_all(&lib).unwrap();
    dest
}

// ============================================================================
// Map registries
// ============================================================================

#[test]
fn Registry___btree_map___looks_up_by_name() {
    let mut installed = BTreeMap::new();
    installed.insert("dep".to_string(), "1.2".to_string());

    assert_eq!(installed.installed_version("dep"), Some("1.2".to_string()));
    assert_eq!(installed.installed_version("other"), None);
}

#[test]
fn Registry___hash_map___looks_up_by_name() {
    let installed: HashMap<String, String> = [("dep".to_string(), "3.0".to_string())].into();

    assert_eq!(installed.installed_version("dep"), Some("3.0".to_string()));
}

// ============================================================================
// Folder registry
// ============================================================================

#[test]
fn FolderRegistry___bundles___sorted_case_insensitively() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "beta.roboFontExt", "beta", "1.0");
    install(temp.path(), "Alpha.roboFontExt", "Alpha", "1.0");
    fs::create_dir_all(temp.path().join("gamma.ROBOFONTEXT")).unwrap();
    fs::create_dir_all(temp.path().join("notes")).unwrap();
    fs::write(temp.path().join("readme.txt"), "x").unwrap();

    let names = FolderRegistry::new(temp.path()).bundles().unwrap();

    assert_eq!(
        names,
        vec!["Alpha.roboFontExt", "beta.roboFontExt", "gamma.ROBOFONTEXT"]
    );
}

#[test]
fn FolderRegistry___bundles___missing_folder___is_empty() {
    let temp = TempDir::new().unwrap();

    let names = FolderRegistry::new(temp.path().join("nope")).bundles().unwrap();

    assert!(names.is_empty());
}

#[test]
fn FolderRegistry___installed_version___reads_manifest() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "dep.roboFontExt", "dep", "2.5");
    let registry = FolderRegistry::new(temp.path());

    assert_eq!(registry.installed_version("dep"), Some("2.5".to_string()));
    assert_eq!(registry.installed_version("missing"), None);
}

#[test]
fn FolderRegistry___installed_version___unreadable_bundle___is_none() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("broken.roboFontExt");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("info.plist"), "garbage").unwrap();

    assert_eq!(FolderRegistry::new(temp.path()).installed_version("broken"), None);
}

#[test]
fn FolderRegistry___resolves_requirements() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "dep.roboFontExt", "dep", "2.5");
    let registry = FolderRegistry::new(temp.path());

    let unmet = crate::requirements::resolve_requirements("dep >= 2.0\nmissing\n", &registry);

    assert_eq!(unmet.into_iter().collect::<Vec<_>>(), vec!["missing"]);
}

// ============================================================================
// Batch validation
// ============================================================================

#[test]
fn FolderRegistry___validate_all___finds_nested_bundles_once() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "good.roboFontExt", "good", "1.0");
    fs::create_dir_all(temp.path().join("nested")).unwrap();
    install(&temp.path().join("nested"), "inner.roboFontExt", "inner", "1.0");
    fs::create_dir_all(temp.path().join("bad.roboFontExt")).unwrap();

    let reports = FolderRegistry::new(temp.path()).validate_all(&Validator::default());

    let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["bad.roboFontExt", "good.roboFontExt", "inner.roboFontExt"]
    );
    assert_eq!(
        reports[0].report.errors(),
        ["info.plist does not exist, this is required."]
    );
    assert!(reports[1].report.is_ok(), "{}", reports[1].report);
    assert!(reports[2].report.is_ok(), "{}", reports[2].report);
}

#[test]
fn error_log___lists_failing_bundles_with_tabbed_errors() {
    let reports = vec![
        BundleReport {
            name: "a.roboFontExt".to_string(),
            report: ValidationReport::from_errors(vec!["first".to_string(), "second".to_string()]),
        },
        BundleReport {
            name: "ok.roboFontExt".to_string(),
            report: ValidationReport::default(),
        },
        BundleReport {
            name: "b.roboFontExt".to_string(),
            report: ValidationReport::from_errors(vec!["third".to_string()]),
        },
    ];

    assert_eq!(
        error_log(&reports),
        "a.roboFontExt\n\tfirst\n\tsecond\n\nb.roboFontExt\n\tthird\n"
    );
}

#[test]
fn write_error_log___all_passing___writes_nothing() {
    let temp = TempDir::new().unwrap();
    let reports = vec![BundleReport {
        name: "ok.roboFontExt".to_string(),
        report: ValidationReport::default(),
    }];

    let written = write_error_log(temp.path(), &reports).unwrap();

    assert_eq!(written, None);
    assert!(!temp.path().join(ERROR_LOG_FILE).exists());
}

#[test]
fn write_error_log___writes_errors_file() {
    let temp = TempDir::new().unwrap();
    let reports = vec![BundleReport {
        name: "bad.roboFontExt".to_string(),
        report: ValidationReport::from_errors(vec!["broken".to_string()]),
    }];

    let written = write_error_log(temp.path(), &reports).unwrap().unwrap();

    assert_eq!(written, temp.path().join("_errors.txt"));
    assert_eq!(fs::read_to_string(written).unwrap(), "bad.roboFontExt\n\tbroken\n");
}
