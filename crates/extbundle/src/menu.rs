//! Menu entries declared by a bundle.

use crate::manifest::{Flag, kind_name};
use plist::{Dictionary, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

const KEY_PATH: &str = "path";
const KEY_PREFERRED_NAME: &str = "preferredName";
const KEY_SHORT_KEY: &str = "shortKey";
const KEY_NEST_IN_SUBMENUS: &str = "nestInSubmenus";

/// Keyboard shortcut of a menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortKey {
    /// A plain key, possibly empty for "no shortcut".
    Key(String),
    /// A modifier mask paired with a key, stored on disk as `[modifier, key]`.
    Modified { modifier: i64, key: String },
}

impl ShortKey {
    /// Read a short key from its property-list form.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(key) => Some(Self::Key(key.clone())),
            Value::Array(items) if items.len() == 2 => {
                let modifier = items[0].as_signed_integer()?;
                let key = items[1].as_string()?;
                Some(Self::Modified {
                    modifier,
                    key: key.to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Key(key) => Value::String(key.clone()),
            Self::Modified { modifier, key } => Value::Array(vec![
                Value::Integer((*modifier).into()),
                Value::String(key.clone()),
            ]),
        }
    }
}

impl Default for ShortKey {
    fn default() -> Self {
        Self::Key(String::new())
    }
}

/// One `addToMenu` entry.
///
/// Values of the wrong type are kept in `malformed` rather than rejected so
/// that validation can report them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuEntry {
    /// Script path relative to the `lib` folder.
    pub path: Option<String>,
    /// Title shown in the menu.
    pub preferred_name: Option<String>,
    pub short_key: Option<ShortKey>,
    pub nest_in_submenus: Option<Flag>,
    /// Known keys holding values of an unexpected type.
    pub malformed: BTreeMap<String, Value>,
    /// Keys this version does not know about.
    pub extra: BTreeMap<String, Value>,
}

impl MenuEntry {
    #[must_use]
    pub fn new(path: &str, preferred_name: &str, short_key: ShortKey) -> Self {
        Self {
            path: Some(path.to_string()),
            preferred_name: Some(preferred_name.to_string()),
            short_key: Some(short_key),
            ..Self::default()
        }
    }

    /// Read an entry from a property-list dictionary.
    pub fn from_dictionary(dict: &Dictionary) -> Self {
        let mut entry = Self::default();
        for (key, value) in dict {
            match key.as_str() {
                KEY_PATH => match value.as_string() {
                    Some(path) => entry.path = Some(path.to_string()),
                    None => {
                        entry.malformed.insert(key.clone(), value.clone());
                    }
                },
                KEY_PREFERRED_NAME => match value.as_string() {
                    Some(name) => entry.preferred_name = Some(name.to_string()),
                    None => {
                        entry.malformed.insert(key.clone(), value.clone());
                    }
                },
                KEY_SHORT_KEY => match ShortKey::from_value(value) {
                    Some(short_key) => entry.short_key = Some(short_key),
                    None => {
                        entry.malformed.insert(key.clone(), value.clone());
                    }
                },
                KEY_NEST_IN_SUBMENUS => match Flag::try_from(value) {
                    Ok(flag) => entry.nest_in_submenus = Some(flag),
                    Err(_) => {
                        entry.malformed.insert(key.clone(), value.clone());
                    }
                },
                _ => {
                    entry.extra.insert(key.clone(), value.clone());
                }
            }
        }
        entry
    }

    pub fn to_value(&self) -> Value {
        let mut dict = Dictionary::new();
        if let Some(path) = &self.path {
            dict.insert(KEY_PATH.to_string(), Value::String(path.clone()));
        }
        if let Some(name) = &self.preferred_name {
            dict.insert(KEY_PREFERRED_NAME.to_string(), Value::String(name.clone()));
        }
        if let Some(short_key) = &self.short_key {
            dict.insert(KEY_SHORT_KEY.to_string(), short_key.to_value());
        }
        if let Some(flag) = self.nest_in_submenus {
            dict.insert(KEY_NEST_IN_SUBMENUS.to_string(), Value::Boolean(flag.get()));
        }
        let malformed = self
            .malformed
            .keys()
            .filter_map(|key| Some((key, self.malformed_value(key)?)));
        for (key, value) in malformed.chain(&self.extra) {
            dict.insert(key.clone(), value.clone());
        }
        Value::Dictionary(dict)
    }

    /// The wrong-typed value read for `key`, unless its field has been set
    /// since.
    pub(crate) fn malformed_value(&self, key: &str) -> Option<&Value> {
        let replaced = match key {
            KEY_PATH => self.path.is_some(),
            KEY_PREFERRED_NAME => self.preferred_name.is_some(),
            KEY_SHORT_KEY => self.short_key.is_some(),
            KEY_NEST_IN_SUBMENUS => self.nest_in_submenus.is_some(),
            _ => false,
        };
        if replaced {
            None
        } else {
            self.malformed.get(key)
        }
    }

    /// Describe the type of a malformed key, if any.
    pub(crate) fn malformed_kind(&self, key: &str) -> Option<&'static str> {
        self.malformed_value(key).map(kind_name)
    }
}

/// A menu entry with its script resolved to an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMenuEntry {
    pub path: PathBuf,
    pub preferred_name: String,
    pub short_key: ShortKey,
    pub nest_in_submenus: bool,
}

/// Host capability that turns resolved menu entries into menu items.
///
/// Entries arrive in declaration order, which is the menu order.
pub trait MenuBuilder {
    fn add_bundle_menu(&mut self, bundle_name: &str, entries: &[ResolvedMenuEntry]);
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn ShortKey___from_value___reads_plain_key() {
        let key = ShortKey::from_value(&Value::String("k".to_string()));

        assert_eq!(key, Some(ShortKey::Key("k".to_string())));
    }

    #[test]
    fn ShortKey___from_value___reads_modifier_pair() {
        let value = Value::Array(vec![
            Value::Integer(1_048_576.into()),
            Value::String("t".to_string()),
        ]);

        let key = ShortKey::from_value(&value).unwrap();

        assert_eq!(
            key,
            ShortKey::Modified {
                modifier: 1_048_576,
                key: "t".to_string()
            }
        );
        assert_eq!(key.to_value(), value);
    }

    #[test]
    fn ShortKey___from_value___rejects_other_shapes() {
        let triple = Value::Array(vec![
            Value::Integer(1.into()),
            Value::String("a".to_string()),
            Value::String("b".to_string()),
        ]);
        let swapped = Value::Array(vec![
            Value::String("a".to_string()),
            Value::Integer(1.into()),
        ]);

        assert_eq!(ShortKey::from_value(&triple), None);
        assert_eq!(ShortKey::from_value(&swapped), None);
        assert_eq!(ShortKey::from_value(&Value::Boolean(true)), None);
    }

    #[test]
    fn MenuEntry___from_dictionary___keeps_wrong_types_as_malformed() {
        let mut dict = Dictionary::new();
        dict.insert("path".to_string(), Value::Integer(3.into()));
        dict.insert("preferredName".to_string(), Value::String("Tool".to_string()));
        dict.insert("nestInSubmenus".to_string(), Value::Integer(7.into()));
        dict.insert("color".to_string(), Value::String("red".to_string()));

        let entry = MenuEntry::from_dictionary(&dict);

        assert_eq!(entry.path, None);
        assert_eq!(entry.preferred_name.as_deref(), Some("Tool"));
        assert_eq!(entry.malformed_kind("path"), Some("integer"));
        assert_eq!(entry.malformed_kind("nestInSubmenus"), Some("integer"));
        assert!(entry.extra.contains_key("color"));
    }

    #[test]
    fn MenuEntry___corrected_malformed_key___is_not_written_back() {
        let mut dict = Dictionary::new();
        dict.insert("path".to_string(), Value::Integer(3.into()));
        let mut entry = MenuEntry::from_dictionary(&dict);

        entry.path = Some("tool.py".to_string());
        let value = entry.to_value();

        let dict = value.as_dictionary().unwrap();
        assert_eq!(dict.get("path").and_then(Value::as_string), Some("tool.py"));
        assert_eq!(entry.malformed_kind("path"), None);
    }

    #[test]
    fn MenuEntry___to_value___writes_all_keys_back() {
        let mut entry = MenuEntry::new("tool.py", "Tool", ShortKey::Key(String::new()));
        entry.nest_in_submenus = Some(Flag::new(false));

        let value = entry.to_value();
        let dict = value.as_dictionary().unwrap();

        assert_eq!(dict.get("path").and_then(Value::as_string), Some("tool.py"));
        assert_eq!(dict.get("shortKey").and_then(Value::as_string), Some(""));
        assert_eq!(dict.get("nestInSubmenus").and_then(Value::as_boolean), Some(false));
        assert_eq!(MenuEntry::from_dictionary(dict), entry);
    }
}
