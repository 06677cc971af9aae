//! Dependencies of a bundle on other installed bundles.
//!
//! `requirements.txt` holds one requirement per line:
//!
//! ```text
//! # comment
//! otherExtension
//! pinned == 1.2
//! recent >= 2.0   # trailing comments are stripped
//! ```

use crate::registry::Registry;
use crate::version::Version;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::Lines;
use tracing::debug;

const COMMENT: char = '#';

/// Version comparison required by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `==`
    Equal,
    /// `>=`
    GreaterOrEqual,
}

impl Comparator {
    /// Operators in matching order: `==` is looked for first.
    const OPERATORS: [(&'static str, Self); 2] =
        [("==", Self::Equal), (">=", Self::GreaterOrEqual)];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::GreaterOrEqual => ">=",
        }
    }

    /// Whether `installed` satisfies this comparator against `required`.
    pub fn accepts(self, installed: &Version, required: &Version) -> bool {
        match self {
            Self::Equal => installed == required,
            Self::GreaterOrEqual => installed >= required,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version clause of a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub comparator: Comparator,
    /// Unparsed version text after the operator.
    pub version: String,
    /// The requirement line without its comment, used in messages.
    pub line: String,
}

impl Constraint {
    /// Check an installed version. Unparseable versions never satisfy.
    pub fn is_satisfied_by(&self, installed: &str) -> bool {
        match (Version::parse(installed), Version::parse(&self.version)) {
            (Ok(installed), Ok(required)) => self.comparator.accepts(&installed, &required),
            _ => false,
        }
    }
}

/// A single parsed requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub constraint: Option<Constraint>,
}

impl Requirement {
    /// Text reported when the requirement is unmet: the bare name, or the
    /// full line for constrained requirements.
    pub fn description(&self) -> &str {
        match &self.constraint {
            Some(constraint) => &constraint.line,
            None => &self.name,
        }
    }
}

/// Lazily parse requirements text.
///
/// Blank and comment lines are skipped, and so are lines with an empty name.
/// A name seen before is skipped even when its constraint differs.
pub fn parse_requirements(text: &str) -> Requirements<'_> {
    Requirements {
        lines: text.lines(),
        seen: HashSet::new(),
    }
}

/// Iterator returned by [`parse_requirements`].
#[derive(Debug)]
pub struct Requirements<'a> {
    lines: Lines<'a>,
    seen: HashSet<String>,
}

impl Iterator for Requirements<'_> {
    type Item = Requirement;

    fn next(&mut self) -> Option<Self::Item> {
        for raw in self.lines.by_ref() {
            let Some(requirement) = parse_line(raw) else {
                continue;
            };
            if self.seen.insert(requirement.name.clone()) {
                return Some(requirement);
            }
        }
        None
    }
}

fn parse_line(raw: &str) -> Option<Requirement> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
        return None;
    }
    let line = trimmed.split(COMMENT).next().unwrap_or_default().trim();

    let (name, constraint) = match Comparator::OPERATORS
        .iter()
        .find_map(|(op, comparator)| line.split_once(op).map(|split| (split, *comparator)))
    {
        Some(((name, version), comparator)) => (
            name,
            Some(Constraint {
                comparator,
                version: version.trim().to_string(),
                line: line.to_string(),
            }),
        ),
        None => (line, None),
    };

    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Requirement {
        name: name.to_string(),
        constraint,
    })
}

/// Descriptions of every requirement in `text` the registry does not satisfy.
///
/// A requirement is unmet when no bundle of that name is installed, or the
/// installed version fails its constraint.
pub fn resolve_requirements(text: &str, registry: &dyn Registry) -> BTreeSet<String> {
    let mut unmet = BTreeSet::new();
    for requirement in parse_requirements(text) {
        let satisfied = match (registry.installed_version(&requirement.name), &requirement.constraint)
        {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(installed), Some(constraint)) => constraint.is_satisfied_by(&installed),
        };
        if !satisfied {
            debug!(requirement = requirement.description(), "requirement not met");
            unmet.insert(requirement.description().to_string());
        }
    }
    unmet
}
