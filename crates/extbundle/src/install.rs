//! Install-time checks.
//!
//! [`InstallCheck`] answers whether a bundle may be installed, in the order a
//! user would want to hear about problems: validation, integrity and expiry,
//! host version, then missing requirements.

use crate::config::BundleConfig;
use crate::hash::{IntegrityError, IntegrityHasher, verify_integrity};
use crate::registry::Registry;
use crate::requirements::resolve_requirements;
use crate::validate::{ValidationReport, Validator};
use crate::Bundle;
use crate::version::Version;
use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{info, warn};

/// Why a bundle may not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallRefusal {
    #[error("Extension '{bundle}' has never been saved on disk")]
    NotOnDisk { bundle: String },

    #[error("Extension '{bundle}' is not valid:\n{report}")]
    Invalid {
        bundle: String,
        report: ValidationReport,
    },

    #[error("{bundle}: {source}")]
    Integrity {
        bundle: String,
        #[source]
        source: IntegrityError,
    },

    #[error("Extension '{bundle}' requires host version {required}, this is {installed}")]
    HostTooOld {
        bundle: String,
        required: String,
        installed: String,
    },

    #[error("Extension '{bundle}' has an unreadable host version requirement '{required}'")]
    BadHostRequirement { bundle: String, required: String },

    #[error(
        "Extension '{bundle}' requires other extensions to be installed: '{}'\n\nInstall those extensions first.",
        .missing.join(", ")
    )]
    MissingRequirements { bundle: String, missing: Vec<String> },
}

/// Preflight for installing bundles against a set of installed bundles.
///
/// # Example
///
/// ```no_run
/// use extbundle::Bundle;
/// use extbundle::install::InstallCheck;
/// use extbundle::registry::FolderRegistry;
///
/// let registry = FolderRegistry::new("Extensions");
/// let bundle = Bundle::load("Downloads/demo.roboFontExt")?;
/// match InstallCheck::new(&registry).host_version("4.5").check(&bundle) {
///     Ok(()) => println!("ready to install"),
///     Err(refusal) => eprintln!("{refusal}"),
/// }
/// # Ok::<(), extbundle::BundleError>(())
/// ```
pub struct InstallCheck<'a> {
    registry: &'a dyn Registry,
    validator: Validator,
    hasher: IntegrityHasher,
    host_version: Option<String>,
    today: NaiveDate,
}

impl<'a> InstallCheck<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self {
            registry,
            validator: Validator::default(),
            hasher: IntegrityHasher::default(),
            host_version: None,
            today: Local::now().date_naive(),
        }
    }

    /// Use the hash passphrase and syntax setting from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &BundleConfig) -> Self {
        self.validator = Validator::new(config);
        self.hasher = IntegrityHasher::from_config(config);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Version of the running host. Without it the host gate is skipped.
    #[must_use]
    pub fn host_version(mut self, version: impl Into<String>) -> Self {
        self.host_version = Some(version.into());
        self
    }

    /// Date expiry is judged against. Defaults to the local date.
    #[must_use]
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn check(&self, bundle: &Bundle) -> Result<(), InstallRefusal> {
        let name = bundle.name();
        let refusal = self.first_refusal(bundle, &name);
        match &refusal {
            Err(refusal) => warn!(bundle = %name, %refusal, "install refused"),
            Ok(()) => info!(bundle = %name, "install check passed"),
        }
        refusal
    }

    fn first_refusal(&self, bundle: &Bundle, name: &str) -> Result<(), InstallRefusal> {
        let layout = bundle.layout().map_err(|_| InstallRefusal::NotOnDisk {
            bundle: name.to_string(),
        })?;

        let report = self.validator.validate(&bundle.manifest, &layout);
        if !report.is_ok() {
            return Err(InstallRefusal::Invalid {
                bundle: name.to_string(),
                report,
            });
        }

        verify_integrity(&layout, &bundle.manifest, &self.hasher, self.today).map_err(
            |source| InstallRefusal::Integrity {
                bundle: name.to_string(),
                source,
            },
        )?;

        if let (Some(installed), Some(required)) =
            (&self.host_version, bundle.manifest.required_host_version())
        {
            check_host(name, installed, required)?;
        }

        let missing = resolve_requirements(&bundle.manifest.requirements, self.registry);
        if !missing.is_empty() {
            return Err(InstallRefusal::MissingRequirements {
                bundle: name.to_string(),
                missing: missing.into_iter().collect(),
            });
        }
        Ok(())
    }
}

fn check_host(name: &str, installed: &str, required: String) -> Result<(), InstallRefusal> {
    let Ok(minimum) = Version::parse(&required) else {
        return Err(InstallRefusal::BadHostRequirement {
            bundle: name.to_string(),
            required,
        });
    };
    // An unparseable host version cannot be shown to be too old.
    match Version::parse(installed) {
        Ok(host) if host < minimum => Err(InstallRefusal::HostTooOld {
            bundle: name.to_string(),
            required,
            installed: installed.to_string(),
        }),
        _ => Ok(()),
    }
}
