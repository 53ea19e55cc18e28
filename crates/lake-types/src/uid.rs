//! Resource identifiers.
//!
//! Valid UIDs:
//! - Are non-empty (the root is addressed with [`Uid::root`], never parsed)
//! - Contain no control characters or whitespace
//! - Contain none of `: # ? [ ] \ " < > { } | ^ \``
//! - Do not start or end with `/`
//! - Contain no empty, `.` or `..` segments
//!
//! `:` is reserved because it separates a state graph name from a version id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::vocab::{META_NS, RES_NS, STATE_NS, VERSION_SEPARATOR};

/// Characters that are forbidden anywhere in a UID.
const FORBIDDEN_CHARS: &[char] = &[
    ':', '#', '?', '[', ']', '\\', '"', '<', '>', '{', '}', '|', '^', '`',
];

/// A validated, client-chosen resource identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    /// Validate and wrap a client UID.
    ///
    /// # Examples
    ///
    /// ```
    /// use lake_types::Uid;
    ///
    /// assert!(Uid::parse("a/b/c").is_ok());
    /// assert!(Uid::parse("").is_err());
    /// assert!(Uid::parse("a//b").is_err());
    /// assert!(Uid::parse("a:v1").is_err());
    /// ```
    pub fn parse(uid: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidUid {
            uid: uid.to_string(),
            reason: reason.to_string(),
        };

        if uid.is_empty() {
            return Err(invalid("uid must not be empty"));
        }
        if let Some(c) = uid.chars().find(|c| c.is_control() || c.is_whitespace()) {
            return Err(invalid(&format!(
                "contains control or whitespace character {c:?}"
            )));
        }
        if let Some(c) = uid.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(invalid(&format!("contains forbidden character {c:?}")));
        }
        if uid.starts_with('/') || uid.ends_with('/') {
            return Err(invalid("must not start or end with '/'"));
        }
        for segment in uid.split('/') {
            match segment {
                "" => return Err(invalid("must not contain empty segments")),
                "." | ".." => return Err(invalid("must not contain '.' or '..' segments")),
                _ => {}
            }
        }
        Ok(Self(uid.to_string()))
    }

    /// The repository root. Its subject is the bare resource namespace.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments (`["a", "b", "c"]` for `a/b/c`). Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Every intermediate path prefix, outermost first: `a`, `a/b` for
    /// `a/b/c`. Top-level UIDs and the root have none.
    pub fn ancestors(&self) -> Vec<Uid> {
        let mut out = Vec::new();
        let mut prefix = String::new();
        let segments: Vec<&str> = self.segments().collect();
        for segment in segments.iter().take(segments.len().saturating_sub(1)) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            out.push(Uid(prefix.clone()));
        }
        out
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({:?})", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl TryFrom<String> for Uid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self::root())
        } else {
            Self::parse(&value)
        }
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// The internal URI triad for one resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceUris {
    /// Current-state subject, `repo:res/<uid>`.
    pub subject: String,
    /// Metadata graph name, `repo:meta/<uid>`.
    pub metadata_graph: String,
    /// Current-state graph name, `repo:state/<uid>`.
    pub state_graph: String,
}

impl ResourceUris {
    /// Namespace a UID under the three fixed prefixes.
    pub fn resolve(uid: &Uid) -> Self {
        Self {
            subject: format!("{RES_NS}{}", uid.as_str()),
            metadata_graph: format!("{META_NS}{}", uid.as_str()),
            state_graph: format!("{STATE_NS}{}", uid.as_str()),
        }
    }

    /// Graph name of a frozen version: `repo:state/<uid>:<version-id>`.
    pub fn version_graph(&self, version_id: &str) -> String {
        format!("{}{VERSION_SEPARATOR}{version_id}", self.state_graph)
    }
}

/// Map a managed URI (optionally with a `#fragment`) back to its UID.
///
/// Returns `None` for URIs outside the resource namespace or with an invalid
/// path.
pub fn uid_of(uri: &str) -> Option<Uid> {
    let path = uri.strip_prefix(RES_NS)?;
    let path = path.split('#').next().unwrap_or_default();
    if path.is_empty() {
        Some(Uid::root())
    } else {
        Uid::parse(path).ok()
    }
}
