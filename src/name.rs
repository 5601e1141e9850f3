//! Addressing value types.
//!
//! A [`Name`] belongs to exactly one [`Namespace`]. The core never parses
//! names; it only uses them as keys for bindings and connections and hands
//! them to layers.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Separator between namespace and label in the text form of a [`Name`]
pub const NAME_SEPARATOR: &str = "://";

/// Namespace of a name, compared case-insensitively.
///
/// Identity is the lowercase name alone; the application flag does not take
/// part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "NamespaceRepr", into = "NamespaceRepr")]
pub struct Namespace {
    name: String,
    is_app: bool,
}

#[derive(Serialize, Deserialize)]
struct NamespaceRepr {
    name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    app: bool,
}

impl Namespace {
    /// Create a layer namespace
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            is_app: false,
        }
    }

    /// Create an application namespace
    pub fn app(name: impl AsRef<str>) -> Self {
        Self {
            is_app: true,
            ..Self::new(name)
        }
    }

    /// Lowercase namespace name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this is an application namespace
    pub fn is_app_namespace(&self) -> bool {
        self.is_app
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Namespace {}

impl Hash for Namespace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialEq<str> for Namespace {
    fn eq(&self, other: &str) -> bool {
        self.name == other.to_lowercase()
    }
}

impl PartialEq<&str> for Namespace {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<NamespaceRepr> for Namespace {
    fn from(repr: NamespaceRepr) -> Self {
        if repr.app {
            Self::app(repr.name)
        } else {
            Self::new(repr.name)
        }
    }
}

impl From<Namespace> for NamespaceRepr {
    fn from(ns: Namespace) -> Self {
        Self {
            name: ns.name,
            app: ns.is_app,
        }
    }
}

/// Name of a service, binding or neighbor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    namespace: Namespace,
    label: String,
}

impl Name {
    /// Create a name within a namespace
    pub fn new(namespace: Namespace, label: impl Into<String>) -> Self {
        Self {
            namespace,
            label: label.into(),
        }
    }

    /// Parse `namespace://label`; a missing separator yields an empty namespace.
    pub fn parse(text: &str) -> Self {
        match text.split_once(NAME_SEPARATOR) {
            Some((ns, label)) => Self::new(Namespace::new(ns), label),
            None => Self::new(Namespace::new(""), text),
        }
    }

    /// Namespace this name belongs to
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Label within the namespace
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Size of the serialized form in bytes
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |bytes| bytes.len())
    }

    /// Check if `prefix` matches this name.
    ///
    /// The namespaces must be equal and the label must start with the label
    /// of `prefix`.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        self.namespace == prefix.namespace && self.label.starts_with(&prefix.label)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{NAME_SEPARATOR}{}", self.namespace, self.label)
    }
}
