//! Extension bundle format for host application plugins
//!
//! This crate provides types and utilities for creating, loading, validating
//! and integrity-checking `.roboFontExt` extension bundles - directory trees
//! holding plugin scripts, optional documentation and resources, and a
//! property-list manifest.
//!
//! # Bundle Structure
//!
//! ```text
//! myExtension.roboFontExt
//! ├── info.plist              # manifest (required)
//! ├── lib/                    # scripts (required)
//! │   └── tool.py
//! ├── html/                   # documentation (optional)
//! │   └── index.html
//! ├── resources/              # images and data (optional)
//! ├── license                 # plain text (optional)
//! ├── requirements.txt        # dependencies on other bundles (optional)
//! └── .hash                   # integrity digest, present iff expireDate is set
//! ```
//!
//! # Example
//!
//! ```no_run
//! use extbundle::{BundleBuilder, Manifest};
//!
//! let mut manifest = Manifest::new("myExtension", "1.0");
//! manifest.developer = Some("Jane Doe".to_string());
//! manifest.developer_url = Some("https://example.com".to_string());
//!
//! let (bundle, report) = BundleBuilder::new(manifest)
//!     .lib_folder("source/lib")
//!     .write("build/myExtension.roboFontExt")?;
//!
//! assert!(report.is_ok(), "{report}");
//! # let _ = bundle;
//! # Ok::<(), extbundle::BundleError>(())
//! ```

mod config;
mod error;
mod layout;
mod manifest;
mod menu;

pub mod builder;
pub mod bundle;
pub mod hash;
pub mod install;
pub mod registry;
pub mod requirements;
pub mod source;
pub mod validate;
pub mod version;

pub use builder::{BundleBuilder, SourceFolders};
pub use bundle::Bundle;
pub use config::BundleConfig;
pub use error::BundleError;
pub use hash::{IntegrityError, IntegrityHasher};
pub use install::{InstallCheck, InstallRefusal};
pub use layout::PathLayout;
pub use manifest::{Flag, FlagError, Manifest};
pub use menu::{MenuBuilder, MenuEntry, ResolvedMenuEntry, ShortKey};
pub use registry::{FolderRegistry, Registry};
pub use requirements::{Comparator, Constraint, Requirement, parse_requirements};
pub use source::BuildRecipe;
pub use validate::{ValidationReport, Validator, validate};
pub use version::{ParseVersionError, Version};

/// Result type for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Bundle directory extension (without the leading dot).
pub const BUNDLE_EXTENSION: &str = "roboFontExt";

/// Manifest file name within the bundle.
pub const MANIFEST_FILE: &str = "info.plist";

/// Extension of scripts the host can run.
pub const SCRIPT_EXTENSION: &str = "py";

/// Date format used by `expireDate`.
pub const EXPIRE_DATE_FORMAT: &str = "%Y-%m-%d";
