//! Bundle engine configuration types

use crate::{BundleError, BundleResult};
use serde::{Deserialize, Serialize};

/// Settings shared by save, validation and install checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Passphrase seeding the integrity digest
    ///
    /// Bundles hashed with one passphrase only verify with the same one.
    #[serde(default)]
    pub hash_passphrase: String,

    /// Read buffer size in bytes used while hashing file contents
    #[serde(default = "default_hash_chunk_size")]
    pub hash_chunk_size: usize,

    /// Parse every script under `lib/` during validation
    #[serde(default = "default_check_script_syntax")]
    pub check_script_syntax: bool,
}

fn default_hash_chunk_size() -> usize {
    1024 * 1024
}

fn default_check_script_syntax() -> bool {
    true
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            hash_passphrase: String::new(),
            hash_chunk_size: default_hash_chunk_size(),
            check_script_syntax: default_check_script_syntax(),
        }
    }
}

impl BundleConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the integrity passphrase
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.hash_passphrase = passphrase.into();
        self
    }

    /// Create configuration from JSON bytes
    ///
    /// Empty input yields the defaults.
    pub fn from_json(bytes: &[u8]) -> BundleResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_slice(bytes)?;
        config.check()?;
        Ok(config)
    }

    /// Serialize the configuration as JSON
    pub fn to_json(&self) -> BundleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check(&self) -> BundleResult<()> {
        if self.hash_chunk_size == 0 {
            return Err(BundleError::Config(
                "hash_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use test_case::test_case;

    #[test]
    fn BundleConfig___default___uses_documented_values() {
        let config = BundleConfig::default();

        assert_eq!(config.hash_passphrase, "");
        assert_eq!(config.hash_chunk_size, 1_048_576);
        assert!(config.check_script_syntax);
    }

    #[test]
    fn BundleConfig___from_json___empty_input_yields_defaults() {
        let config = BundleConfig::from_json(b"").unwrap();

        assert_eq!(config, BundleConfig::default());
    }

    #[test]
    fn BundleConfig___from_json___missing_fields_use_defaults() {
        let config = BundleConfig::from_json(br#"{"hash_passphrase": "secret"}"#).unwrap();

        assert_eq!(config.hash_passphrase, "secret");
        assert_eq!(config.hash_chunk_size, 1_048_576);
        assert!(config.check_script_syntax);
    }

    #[test_case(r#"{"hash_chunk_size": 1}"#, 1)]
    #[test_case(r#"{"hash_chunk_size": 4096}"#, 4096)]
    #[test_case(r#"{}"#, 1_048_576)]
    fn BundleConfig___hash_chunk_size_json___parses_correctly(json: &str, expected: usize) {
        let config = BundleConfig::from_json(json.as_bytes()).unwrap();

        assert_eq!(config.hash_chunk_size, expected);
    }

    #[test]
    fn BundleConfig___from_json___rejects_zero_chunk_size() {
        let err = BundleConfig::from_json(br#"{"hash_chunk_size": 0}"#).unwrap_err();

        assert!(matches!(err, BundleError::Config(_)));
    }

    #[test]
    fn BundleConfig___from_json___rejects_malformed_json() {
        let err = BundleConfig::from_json(b"{not json").unwrap_err();

        assert!(matches!(err, BundleError::Json(_)));
    }

    #[test]
    fn BundleConfig___json_roundtrip___preserves_data() {
        let config = BundleConfig {
            hash_passphrase: "pass".to_string(),
            hash_chunk_size: 512,
            check_script_syntax: false,
        };

        let json = config.to_json().unwrap();
        let parsed = BundleConfig::from_json(json.as_bytes()).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn BundleConfig___with_passphrase___sets_passphrase() {
        let config = BundleConfig::new().with_passphrase("p");

        assert_eq!(config.hash_passphrase, "p");
    }
}
