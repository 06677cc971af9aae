//! Bundle validation.
//!
//! Validation never fails for a malformed bundle: every violated rule adds a
//! human-readable message to a [`ValidationReport`]. Only the existence gate
//! (root on disk, readable `info.plist`) stops further checks.

use crate::bundle::Bundle;
use crate::config::BundleConfig;
use crate::layout::{HTML_INDEX_FILE, PathLayout};
use crate::manifest::{
    KEY_ADD_TO_MENU, KEY_DEVELOPER, KEY_DEVELOPER_URL, KEY_DOCUMENTATION_URL, KEY_EXPIRE_DATE,
    KEY_HTML, KEY_LAUNCH_AT_STARTUP, KEY_MAIN_SCRIPT, KEY_NAME, KEY_REQUIRES_VERSION_MAJOR,
    KEY_REQUIRES_VERSION_MINOR, KEY_UNINSTALL_SCRIPT, KEY_VERSION, Manifest, kind_name,
    parse_expire_date,
};
use crate::menu::MenuEntry;
use crate::version::Version;
use crate::{BUNDLE_EXTENSION, BundleResult, SCRIPT_EXTENSION};
use plist::Value;
use rustpython_parser::{Mode, parse};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;

/// Markdown documentation entry point accepted in place of `index.html`.
const HTML_INDEX_MARKDOWN: &str = "index.md";

/// Ordered list of validation problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self { errors }
    }

    /// True when no rule was violated.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    /// Machine-readable form: `{"errors": [...]}`.
    pub fn to_json(&self) -> BundleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errors.join("\n"))
    }
}

/// Parse-only check of script sources.
pub trait SyntaxChecker {
    /// Return the parser message when `source` does not parse.
    fn check(&self, source: &str, path: &Path) -> Result<(), String>;
}

/// Python syntax check backed by `rustpython-parser`. Nothing is executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonSyntax;

impl SyntaxChecker for PythonSyntax {
    fn check(&self, source: &str, path: &Path) -> Result<(), String> {
        parse(source, Mode::Module, &path.to_string_lossy())
            .map(|_| ())
            .map_err(|err| err.error.to_string())
    }
}

/// Runs the validation rules against a manifest and its layout.
pub struct Validator {
    syntax: Option<Box<dyn SyntaxChecker>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            syntax: Some(Box::new(PythonSyntax)),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("check_script_syntax", &self.syntax.is_some())
            .finish()
    }
}

impl Validator {
    pub fn new(config: &BundleConfig) -> Self {
        if config.check_script_syntax {
            Self::default()
        } else {
            Self::default().without_syntax_check()
        }
    }

    /// Replace the script syntax checker.
    #[must_use]
    pub fn with_syntax_checker(mut self, checker: impl SyntaxChecker + 'static) -> Self {
        self.syntax = Some(Box::new(checker));
        self
    }

    #[must_use]
    pub fn without_syntax_check(mut self) -> Self {
        self.syntax = None;
        self
    }

    /// Validate an in-memory manifest against the tree at `layout`.
    pub fn validate(&self, manifest: &Manifest, layout: &PathLayout) -> ValidationReport {
        if let Some(error) = existence_gate(layout) {
            debug!(root = %layout.root().display(), %error, "bundle failed existence gate");
            return ValidationReport::from_errors(vec![error]);
        }

        let mut checks = Checks {
            manifest,
            layout,
            errors: Vec::new(),
        };
        checks.naming();
        checks.required_text();
        checks.menu();
        checks.typed_optionals();
        checks.cross_references();
        if let Some(syntax) = &self.syntax {
            checks.script_syntax(syntax.as_ref());
        }
        checks.urls();
        checks.expire_date();

        let report = ValidationReport::from_errors(checks.errors);
        info!(
            bundle = %layout.file_name(),
            errors = report.errors().len(),
            "validated bundle"
        );
        report
    }

    /// Load the bundle at `root` and validate it.
    pub fn validate_path(&self, root: &Path) -> ValidationReport {
        let layout = PathLayout::new(root);
        if let Some(error) = existence_gate(&layout) {
            return ValidationReport::from_errors(vec![error]);
        }
        match Bundle::load(root) {
            Ok(bundle) => self.validate(&bundle.manifest, &layout),
            Err(err) => ValidationReport::from_errors(vec![err.to_string()]),
        }
    }
}

/// Validate with the default rules, including the Python syntax check.
pub fn validate(manifest: &Manifest, layout: &PathLayout) -> ValidationReport {
    Validator::default().validate(manifest, layout)
}

fn existence_gate(layout: &PathLayout) -> Option<String> {
    if !layout.root().exists() {
        return Some(
            "Extension bundle must be saved on disk before it can be validated.".to_string(),
        );
    }
    let manifest_path = layout.manifest_path();
    if !manifest_path.is_file() {
        return Some("info.plist does not exist, this is required.".to_string());
    }
    let readable = fs::read(&manifest_path)
        .ok()
        .and_then(|bytes| Manifest::deserialize(&bytes).ok())
        .is_some();
    if !readable {
        return Some("info.plist is not formatted as a *.plist file and unreadable.".to_string());
    }
    None
}

/// Whether `text` is an absolute URL with a scheme and a host.
pub(crate) fn is_valid_url(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    // `Url::parse` fills in a host for `http:example.com`; require `//`.
    if !text
        .split_once("://")
        .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
    {
        return false;
    }
    Url::parse(text)
        .map(|url| !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

fn is_script_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.to_string_lossy() == SCRIPT_EXTENSION)
}

struct Checks<'a> {
    manifest: &'a Manifest,
    layout: &'a PathLayout,
    errors: Vec<String>,
}

impl Checks<'_> {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn malformed(&self, key: &str) -> Option<&Value> {
        self.manifest.malformed_value(key)
    }

    fn naming(&mut self) {
        if !self.layout.has_package_extension() {
            self.error(format!(
                "Extension bundle must be saved with `.{BUNDLE_EXTENSION}` suffix."
            ));
        }
    }

    fn required_text(&mut self) {
        let m = self.manifest;
        let fields = [
            ("Extension name", KEY_NAME, &m.name),
            ("Developer name", KEY_DEVELOPER, &m.developer),
            ("Developer URL", KEY_DEVELOPER_URL, &m.developer_url),
            ("Extension version", KEY_VERSION, &m.version),
        ];
        for (label, key, value) in fields {
            if let Some(raw) = self.malformed(key) {
                let kind = kind_name(raw);
                self.error(format!("{label} should be a string, instead it is a {kind}"));
                continue;
            }
            match value.as_deref() {
                None => self.error(format!("{label} is missing, this is required.")),
                Some("") => self.error(format!("{label} cannot be an empty string")),
                Some(_) => {}
            }
        }
    }

    fn menu(&mut self) {
        if let Some(raw) = self.malformed(KEY_ADD_TO_MENU).cloned() {
            let Some(items) = raw.as_array() else {
                self.error(format!(
                    "Add to Menu should be a list, instead it is a {}",
                    kind_name(&raw)
                ));
                return;
            };
            for item in items {
                match item.as_dictionary() {
                    Some(dict) => self.menu_entry(&MenuEntry::from_dictionary(dict)),
                    None => self.error(format!(
                        "Add to Menu items should be dictionaries, instead one is a {}",
                        kind_name(item)
                    )),
                }
            }
            return;
        }
        let manifest = self.manifest;
        for entry in &manifest.add_to_menu {
            self.menu_entry(entry);
        }
    }

    fn menu_entry(&mut self, entry: &MenuEntry) {
        match (&entry.path, entry.malformed_kind("path")) {
            (_, Some(kind)) => self.error(format!(
                "Add to Menu `path` should be a `str`, instead it is a {kind}"
            )),
            (None, None) => self.error("`path` missing from Add to Menu dictionary"),
            (Some(path), None) => {
                if !is_script_path(path) {
                    self.error(format!(
                        "Add to Menu `path` '{path}' should be a relative path to a *.py file."
                    ));
                }
                if !self.layout.lib_folder().join(path).is_file() {
                    self.error(format!(
                        "Add to Menu `path` '{path}' does not exist in lib, this is required."
                    ));
                }
            }
        }

        match (&entry.preferred_name, entry.malformed_kind("preferredName")) {
            (_, Some(kind)) => self.error(format!(
                "Add to Menu `preferredName` should be a `str`, instead it is a {kind}"
            )),
            (None, None) => self.error("`preferredName` missing from Add to Menu dictionary"),
            (Some(_), None) => {}
        }

        match (&entry.short_key, entry.malformed_kind("shortKey")) {
            (_, Some(kind)) => self.error(format!(
                "Add to Menu `shortKey` should be a `str` or a `(modifier, key)` pair, instead it is a {kind}"
            )),
            (None, None) => self.error("`shortKey` missing from Add to Menu dictionary"),
            (Some(_), None) => {}
        }

        if let Some(raw) = entry.malformed_value("nestInSubmenus") {
            self.error(format!(
                "Add to Menu `nestInSubmenus` should be a `bool` or 0/1, instead it is {}",
                describe_flag(raw)
            ));
        }
    }

    fn typed_optionals(&mut self) {
        for (label, key) in [("html", KEY_HTML), ("launchAtStartUp", KEY_LAUNCH_AT_STARTUP)] {
            if let Some(raw) = self.malformed(key) {
                let message = match raw {
                    Value::Integer(_) => {
                        format!("`{label}` can be an int, but it should be either 0 or 1")
                    }
                    other => format!(
                        "`{label}` should be a bool or an int, instead it is a {}",
                        kind_name(other)
                    ),
                };
                self.error(message);
            }
        }

        let text_fields = [
            ("Documentation URL", KEY_DOCUMENTATION_URL),
            ("Main script", KEY_MAIN_SCRIPT),
            ("Requires version major", KEY_REQUIRES_VERSION_MAJOR),
            ("Requires version minor", KEY_REQUIRES_VERSION_MINOR),
            ("Uninstall script", KEY_UNINSTALL_SCRIPT),
            ("Expire date", KEY_EXPIRE_DATE),
        ];
        for (label, key) in text_fields {
            if let Some(raw) = self.malformed(key) {
                let kind = kind_name(raw);
                self.error(format!("{label} should be a string, instead it is a {kind}"));
            }
        }

        if let Some(required) = self.manifest.required_host_version()
            && Version::parse(&required).is_err()
        {
            self.error(format!(
                "Requires version '{required}' is not a valid version"
            ));
        }
    }

    fn cross_references(&mut self) {
        let manifest = self.manifest;
        let lib = self.layout.lib_folder();
        if !lib.is_dir() {
            self.error("Lib folder does not exist, this is required.");
        }

        if let Some(script) = manifest.main_script.as_deref().filter(|s| !s.is_empty()) {
            if !is_script_path(script) {
                self.error(format!(
                    "Main script '{script}' should be a relative path to a *.py file."
                ));
            }
            if !lib.join(script).is_file() {
                self.error(format!(
                    "Main .py script '{script}' does not exist, this is required."
                ));
            }
        }

        if let Some(script) = manifest
            .uninstall_script
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            if !is_script_path(script) {
                self.error(format!(
                    "Uninstall script '{script}' should be a relative path to a *.py file."
                ));
            }
            if !lib.join(script).is_file() {
                self.error(format!(
                    "Uninstall script '{script}' does not exist, since it is defined, it is required"
                ));
            }
        }

        if manifest.html.is_some_and(|flag| flag.get()) {
            let html = self.layout.html_folder();
            let has_index = html.join(HTML_INDEX_FILE).is_file()
                || html.join(HTML_INDEX_MARKDOWN).is_file();
            if !has_index {
                self.error(format!(
                    "html folder must contain {HTML_INDEX_FILE} or {HTML_INDEX_MARKDOWN} when `html` is set"
                ));
            }
        }
    }

    fn script_syntax(&mut self, checker: &dyn SyntaxChecker) {
        let lib = self.layout.lib_folder();
        if !lib.is_dir() {
            return;
        }

        let mut scripts: Vec<_> = WalkDir::new(&lib)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_script_path(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.into_path())
            .collect();
        scripts.sort();

        for path in scripts {
            let relative = path
                .strip_prefix(&lib)
                .map(|rel| {
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_else(|_| path.display().to_string());
            let outcome = match fs::read_to_string(&path) {
                Ok(source) => checker.check(&source, &path),
                Err(err) => Err(format!("could not be read: {err}")),
            };
            if let Err(message) = outcome {
                self.error(format!("{relative}: {message}"));
            }
        }
    }

    fn urls(&mut self) {
        let m = self.manifest;
        let urls = [
            ("Documentation URL", &m.documentation_url),
            ("Developer URL", &m.developer_url),
        ];
        for (label, value) in urls {
            if let Some(url) = value.as_deref().filter(|u| !u.is_empty())
                && !is_valid_url(url)
            {
                self.error(format!("{label} is not valid"));
            }
        }
    }

    fn expire_date(&mut self) {
        let manifest = self.manifest;
        if let Some(date) = manifest.expire_date.as_deref().filter(|d| !d.is_empty())
            && parse_expire_date(date).is_none()
        {
            self.error("expire date is not set in the correct format: 'YYYY-MM-DD'");
        }
    }
}

fn describe_flag(raw: &Value) -> String {
    match raw {
        Value::Integer(i) => match i.as_signed() {
            Some(n) => format!("the int {n}"),
            None => "an out of range int".to_string(),
        },
        other => format!("a {}", kind_name(other)),
    }
}
