//! Dotted release version parsing and ordering.
//!
//! Versions are compared component-wise on their numeric release segment,
//! with missing trailing components treated as zero (`1.0 == 1.0.0`).
//! Pre-release, post-release and development suffixes follow the usual
//! release-version ordering:
//!
//! ```text
//! 1.0.dev1 < 1.0a1 < 1.0b2 < 1.0rc1 < 1.0 < 1.0.post1
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string that could not be interpreted as a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version: `{input}`")]
pub struct ParseVersionError {
    input: String,
}

impl ParseVersionError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }

    /// The rejected input.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Pre-release phase, ordered alpha < beta < candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Alpha,
    Beta,
    Candidate,
}

/// A parsed version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    release: Vec<u64>,
    pre: Option<(Phase, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(Phase, u64),
    Final,
}

impl Version {
    /// Parse a version string such as `"1.2"`, `"2.0b3"` or `"1.0.post1"`.
    pub fn parse(input: &str) -> Result<Self, ParseVersionError> {
        let trimmed = input.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let body = lowered.strip_prefix('v').unwrap_or(&lowered);

        let body = match body.split_once('+') {
            Some((head, local)) => {
                let local_ok = !local.is_empty()
                    && local
                        .split(['.', '-', '_'])
                        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
                if !local_ok {
                    return Err(ParseVersionError::new(input));
                }
                head
            }
            None => body,
        };

        let mut cursor = Cursor::new(body);

        let mut release = Vec::new();
        match cursor.number() {
            Some(n) => release.push(n),
            None => return Err(ParseVersionError::new(input)),
        }
        while cursor.peek() == Some('.') && cursor.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            cursor.advance(1);
            match cursor.number() {
                Some(n) => release.push(n),
                None => return Err(ParseVersionError::new(input)),
            }
        }

        let pre = cursor.labelled(
            &[
                ("alpha", Phase::Alpha),
                ("a", Phase::Alpha),
                ("beta", Phase::Beta),
                ("b", Phase::Beta),
                ("preview", Phase::Candidate),
                ("pre", Phase::Candidate),
                ("rc", Phase::Candidate),
                ("c", Phase::Candidate),
            ],
        );

        let post = cursor.implicit_post().or_else(|| {
            cursor
                .labelled(&[("post", ()), ("rev", ()), ("r", ())])
                .map(|((), n)| n)
        });

        let dev = cursor.labelled(&[("dev", ())]).map(|((), n)| n);

        if !cursor.is_done() {
            return Err(ParseVersionError::new(input));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            release,
            pre,
            post,
            dev,
        })
    }

    /// Numeric release components, e.g. `[1, 2, 0]` for `"1.2.0"`.
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Returns true for alpha, beta, candidate and development versions.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (Some((phase, n)), _, _) => PreKey::Pre(phase, n),
            (None, None, Some(_)) => PreKey::DevOnly,
            _ => PreKey::Final,
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Result<Ordering, ParseVersionError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_release(&self.release, &other.release)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Byte cursor over an ASCII version body.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.text.len());
    }

    fn is_done(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn number(&mut self) -> Option<u64> {
        let digits = self.rest().bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let value = self.rest()[..digits].parse().ok()?;
        self.advance(digits);
        Some(value)
    }

    fn separator(&mut self) {
        if matches!(self.peek(), Some('.' | '-' | '_')) {
            self.advance(1);
        }
    }

    /// `[sep] label [sep] [number]`, restoring the position when no label matches.
    fn labelled<T: Copy>(&mut self, labels: &[(&str, T)]) -> Option<(T, u64)> {
        let start = self.pos;
        self.separator();
        for (label, tag) in labels {
            if self.rest().starts_with(label) {
                self.advance(label.len());
                let before_number = self.pos;
                self.separator();
                let n = match self.number() {
                    Some(n) => n,
                    None => {
                        self.pos = before_number;
                        0
                    }
                };
                return Some((*tag, n));
            }
        }
        self.pos = start;
        None
    }

    /// `-N` shorthand for a post release.
    fn implicit_post(&mut self) -> Option<u64> {
        if self.peek() == Some('-') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            let start = self.pos;
            self.advance(1);
            match self.number() {
                Some(n) => return Some(n),
                None => self.pos = start,
            }
        }
        None
    }
}
