//! Manifest schema for extension bundles.
//!
//! The manifest is the `info.plist` file in the bundle root. Reading never
//! fails because a known key holds the wrong type: such values are kept in
//! [`Manifest::malformed`] so that validation can report them and a re-save
//! preserves them.

use crate::menu::MenuEntry;
use crate::{BundleError, BundleResult, EXPIRE_DATE_FORMAT};
use chrono::NaiveDate;
use plist::{Dictionary, Value};
use std::collections::BTreeMap;
use std::io::Cursor;
use thiserror::Error;

pub(crate) const KEY_NAME: &str = "name";
pub(crate) const KEY_LEGACY_NAME: &str = "extensionName";
pub(crate) const KEY_DEVELOPER: &str = "developer";
pub(crate) const KEY_DEVELOPER_URL: &str = "developerURL";
pub(crate) const KEY_VERSION: &str = "version";
pub(crate) const KEY_TIMESTAMP: &str = "timeStamp";
pub(crate) const KEY_ADD_TO_MENU: &str = "addToMenu";
pub(crate) const KEY_HTML: &str = "html";
pub(crate) const KEY_DOCUMENTATION_URL: &str = "documentationURL";
pub(crate) const KEY_LAUNCH_AT_STARTUP: &str = "launchAtStartUp";
pub(crate) const KEY_MAIN_SCRIPT: &str = "mainScript";
pub(crate) const KEY_UNINSTALL_SCRIPT: &str = "uninstallScript";
pub(crate) const KEY_REQUIRES_VERSION_MAJOR: &str = "requiresVersionMajor";
pub(crate) const KEY_REQUIRES_VERSION_MINOR: &str = "requiresVersionMinor";
pub(crate) const KEY_EXPIRE_DATE: &str = "expireDate";

/// Boolean manifest value that may also be stored as the integer 0 or 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag(bool);

impl Flag {
    #[must_use]
    pub const fn new(value: bool) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> bool {
        self.0
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

/// Why a value could not be read as a [`Flag`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("integer flag must be 0 or 1, got {0}")]
    OutOfRange(i64),

    #[error("expected a bool or an integer, got {0}")]
    WrongType(&'static str),
}

impl TryFrom<&Value> for Flag {
    type Error = FlagError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(b) => Ok(Self(*b)),
            Value::Integer(i) => match i.as_signed() {
                Some(0) => Ok(Self(false)),
                Some(1) => Ok(Self(true)),
                Some(n) => Err(FlagError::OutOfRange(n)),
                None => Err(FlagError::OutOfRange(i64::MAX)),
            },
            other => Err(FlagError::WrongType(kind_name(other))),
        }
    }
}

/// Bundle manifest: the metadata stored in `info.plist` plus the contents of
/// the `license`, `requirements.txt` and `.hash` side files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub name: Option<String>,
    pub developer: Option<String>,
    pub developer_url: Option<String>,
    pub version: Option<String>,

    /// Seconds since the Unix epoch, assigned when the bundle is saved.
    pub timestamp: Option<f64>,

    /// Menu entries in menu order.
    pub add_to_menu: Vec<MenuEntry>,

    /// Legacy switch: the bundle ships documentation in `html/`.
    pub html: Option<Flag>,
    pub documentation_url: Option<String>,
    pub launch_at_startup: Option<Flag>,

    /// Script run at startup, relative to `lib/`.
    pub main_script: Option<String>,
    /// Script run on uninstall, relative to `lib/`.
    pub uninstall_script: Option<String>,

    pub requires_version_major: Option<String>,
    pub requires_version_minor: Option<String>,

    /// `YYYY-MM-DD`. A bundle with an expiry date carries a `.hash` marker.
    pub expire_date: Option<String>,

    /// Contents of the `license` side file.
    pub license: String,
    /// Contents of the `requirements.txt` side file.
    pub requirements: String,
    /// Contents of the `.hash` side file.
    pub hash: Option<String>,

    /// Known keys whose stored value had the wrong type.
    pub malformed: BTreeMap<String, Value>,
    /// Keys this version does not know about, written back unchanged.
    pub extra: BTreeMap<String, Value>,
}

impl Manifest {
    /// Create a manifest with the given name and version.
    #[must_use]
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            ..Self::default()
        }
    }

    /// The bundle name, failing when it is absent or empty.
    pub fn required_name(&self) -> BundleResult<&str> {
        required(self.name.as_deref(), KEY_NAME)
    }

    /// The bundle version, failing when it is absent or empty.
    pub fn required_version(&self) -> BundleResult<&str> {
        required(self.version.as_deref(), KEY_VERSION)
    }

    /// Minimum host version as `"major.minor"`, when both parts are set.
    #[must_use]
    pub fn required_host_version(&self) -> Option<String> {
        match (&self.requires_version_major, &self.requires_version_minor) {
            (Some(major), Some(minor)) if !major.is_empty() && !minor.is_empty() => {
                Some(format!("{major}.{minor}"))
            }
            _ => None,
        }
    }

    /// Returns true when an expiry date is set, which makes the bundle carry
    /// a `.hash` marker.
    #[must_use]
    pub fn has_expire_date(&self) -> bool {
        self.expire_date.as_deref().is_some_and(|date| !date.is_empty())
    }

    /// Parse a property list (XML or binary) into a manifest.
    pub fn deserialize(bytes: &[u8]) -> BundleResult<Self> {
        let value = Value::from_reader(Cursor::new(bytes))?;
        Self::from_value(value)
    }

    /// Render the manifest as an XML property list.
    ///
    /// Values that are unset, empty, false or zero are omitted and keys are
    /// written in a fixed order, so equal manifests produce equal bytes.
    pub fn serialize(&self) -> BundleResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_value().to_writer_xml(&mut buf)?;
        Ok(buf)
    }

    /// Build a manifest from a property-list dictionary.
    pub fn from_value(value: Value) -> BundleResult<Self> {
        let dict = match value {
            Value::Dictionary(dict) => dict,
            other => {
                return Err(BundleError::Format(format!(
                    "manifest root must be a dictionary, got {}",
                    kind_name(&other)
                )));
            }
        };

        let has_name = dict.contains_key(KEY_NAME);
        let mut manifest = Self::default();
        for (key, value) in dict {
            manifest.read_key(&key, value, has_name);
        }
        Ok(manifest)
    }

    fn read_key(&mut self, key: &str, value: Value, has_name: bool) {
        let malformed = &mut self.malformed;
        match key {
            KEY_NAME => read_text(&mut self.name, key, value, malformed),
            KEY_LEGACY_NAME if !has_name => {
                read_text(&mut self.name, KEY_NAME, value, malformed);
            }
            KEY_DEVELOPER => read_text(&mut self.developer, key, value, malformed),
            KEY_DEVELOPER_URL => read_text(&mut self.developer_url, key, value, malformed),
            KEY_VERSION => read_text(&mut self.version, key, value, malformed),
            KEY_DOCUMENTATION_URL => {
                read_text(&mut self.documentation_url, key, value, malformed);
            }
            KEY_MAIN_SCRIPT => read_text(&mut self.main_script, key, value, malformed),
            KEY_UNINSTALL_SCRIPT => read_text(&mut self.uninstall_script, key, value, malformed),
            KEY_REQUIRES_VERSION_MAJOR => {
                read_text(&mut self.requires_version_major, key, value, malformed);
            }
            KEY_REQUIRES_VERSION_MINOR => {
                read_text(&mut self.requires_version_minor, key, value, malformed);
            }
            KEY_EXPIRE_DATE => read_text(&mut self.expire_date, key, value, malformed),
            KEY_TIMESTAMP => match seconds(&value) {
                Some(seconds) => self.timestamp = Some(seconds),
                None => {
                    malformed.insert(key.to_string(), value);
                }
            },
            KEY_HTML => read_flag(&mut self.html, key, value, malformed),
            KEY_LAUNCH_AT_STARTUP => read_flag(&mut self.launch_at_startup, key, value, malformed),
            KEY_ADD_TO_MENU => match menu_entries(&value) {
                Some(entries) => self.add_to_menu = entries,
                None => {
                    malformed.insert(key.to_string(), value);
                }
            },
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    /// Render the manifest as a property-list dictionary.
    pub fn to_value(&self) -> Value {
        let mut dict = Dictionary::new();
        write_text(&mut dict, KEY_NAME, self.name.as_deref());
        write_text(&mut dict, KEY_DEVELOPER, self.developer.as_deref());
        write_text(&mut dict, KEY_DEVELOPER_URL, self.developer_url.as_deref());
        write_text(&mut dict, KEY_VERSION, self.version.as_deref());
        if let Some(seconds) = self.timestamp.filter(|s| *s != 0.0) {
            dict.insert(KEY_TIMESTAMP.to_string(), Value::Real(seconds));
        }
        if !self.add_to_menu.is_empty() {
            let entries = self.add_to_menu.iter().map(MenuEntry::to_value).collect();
            dict.insert(KEY_ADD_TO_MENU.to_string(), Value::Array(entries));
        }
        write_flag(&mut dict, KEY_HTML, self.html);
        write_text(&mut dict, KEY_DOCUMENTATION_URL, self.documentation_url.as_deref());
        write_flag(&mut dict, KEY_LAUNCH_AT_STARTUP, self.launch_at_startup);
        write_text(&mut dict, KEY_MAIN_SCRIPT, self.main_script.as_deref());
        write_text(&mut dict, KEY_UNINSTALL_SCRIPT, self.uninstall_script.as_deref());
        write_text(
            &mut dict,
            KEY_REQUIRES_VERSION_MAJOR,
            self.requires_version_major.as_deref(),
        );
        write_text(
            &mut dict,
            KEY_REQUIRES_VERSION_MINOR,
            self.requires_version_minor.as_deref(),
        );
        write_text(&mut dict, KEY_EXPIRE_DATE, self.expire_date.as_deref());

        let malformed = self
            .malformed
            .keys()
            .filter_map(|key| Some((key, self.malformed_value(key)?)));
        for (key, value) in malformed.chain(&self.extra) {
            if !is_falsey(value) {
                dict.insert(key.clone(), value.clone());
            }
        }
        Value::Dictionary(dict)
    }

    /// The wrong-typed value read for `key`, unless its field has been set
    /// since. A set field replaces the stale value.
    pub(crate) fn malformed_value(&self, key: &str) -> Option<&Value> {
        let replaced = match key {
            KEY_NAME => self.name.is_some(),
            KEY_DEVELOPER => self.developer.is_some(),
            KEY_DEVELOPER_URL => self.developer_url.is_some(),
            KEY_VERSION => self.version.is_some(),
            KEY_TIMESTAMP => self.timestamp.is_some(),
            KEY_ADD_TO_MENU => !self.add_to_menu.is_empty(),
            KEY_HTML => self.html.is_some(),
            KEY_DOCUMENTATION_URL => self.documentation_url.is_some(),
            KEY_LAUNCH_AT_STARTUP => self.launch_at_startup.is_some(),
            KEY_MAIN_SCRIPT => self.main_script.is_some(),
            KEY_UNINSTALL_SCRIPT => self.uninstall_script.is_some(),
            KEY_REQUIRES_VERSION_MAJOR => self.requires_version_major.is_some(),
            KEY_REQUIRES_VERSION_MINOR => self.requires_version_minor.is_some(),
            KEY_EXPIRE_DATE => self.expire_date.is_some(),
            _ => false,
        };
        if replaced {
            None
        } else {
            self.malformed.get(key)
        }
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> BundleResult<&'a str> {
    match value {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(BundleError::MissingField(key.to_string())),
    }
}

fn read_text(
    slot: &mut Option<String>,
    key: &str,
    value: Value,
    malformed: &mut BTreeMap<String, Value>,
) {
    match value {
        Value::String(text) => *slot = Some(text),
        other => {
            malformed.insert(key.to_string(), other);
        }
    }
}

fn read_flag(
    slot: &mut Option<Flag>,
    key: &str,
    value: Value,
    malformed: &mut BTreeMap<String, Value>,
) {
    match Flag::try_from(&value) {
        Ok(flag) => *slot = Some(flag),
        Err(_) => {
            malformed.insert(key.to_string(), value);
        }
    }
}

fn seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Real(seconds) => Some(*seconds),
        Value::Integer(i) => i.as_signed().map(|n| n as f64),
        _ => None,
    }
}

/// Entries of an `addToMenu` array, or `None` unless every item is a dictionary.
fn menu_entries(value: &Value) -> Option<Vec<MenuEntry>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_dictionary().map(MenuEntry::from_dictionary))
        .collect()
}

fn write_text(dict: &mut Dictionary, key: &str, value: Option<&str>) {
    if let Some(text) = value.filter(|text| !text.is_empty()) {
        dict.insert(key.to_string(), Value::String(text.to_string()));
    }
}

fn write_flag(dict: &mut Dictionary, key: &str, value: Option<Flag>) {
    if value.is_some_and(Flag::get) {
        dict.insert(key.to_string(), Value::Boolean(true));
    }
}

pub(crate) fn is_falsey(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => !b,
        Value::Integer(i) => i.as_signed() == Some(0),
        Value::Real(r) => *r == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Dictionary(dict) => dict.is_empty(),
        Value::Data(bytes) => bytes.is_empty(),
        _ => false,
    }
}

/// Short type name used in validation messages.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "array",
        Value::Dictionary(_) => "dictionary",
        Value::Boolean(_) => "bool",
        Value::Data(_) => "data",
        Value::Date(_) => "date",
        Value::Real(_) => "real",
        Value::Integer(_) => "integer",
        Value::String(_) => "string",
        _ => "unknown",
    }
}

/// Parse an expiry date, requiring the exact `YYYY-MM-DD` shape.
pub(crate) fn parse_expire_date(text: &str) -> Option<NaiveDate> {
    let shaped = text.len() == 10
        && text.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(text, EXPIRE_DATE_FORMAT).ok()
}
