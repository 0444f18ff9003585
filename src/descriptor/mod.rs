//! Job descriptors for the Dolby Encoding Engine.
//!
//! A descriptor is built as an in-memory [`Element`] tree
//! ([`builder::JobDescriptor`]), adjusted for engine quirks while still in
//! memory ([`compat`]) and serialized to pretty-printed XML ([`xml`]).

pub mod builder;
pub mod compat;
pub mod xml;

pub use builder::{build, write_descriptor, JobDescriptor};
pub use compat::{apply_online_compat, sanitize_descriptor_file, SanitizeOutcome};

use thiserror::Error;

/// Errors from building, writing or reading a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("XML serialization failed: {0}")]
    Serialize(String),

    #[error("XML parse failed: {0}")]
    Parse(String),

    #[error("failed to write descriptor {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A named node with optional text and ordered children.
///
/// Attributes and children keep insertion order, which keeps serialization
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Leaf node carrying `text`.
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append a text leaf.
    pub fn with(self, name: &str, text: impl Into<String>) -> Self {
        self.child(Element::leaf(name, text))
    }

    /// First direct child with `name`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow a `/`-separated path of direct children.
    pub fn at(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .try_fold(self, |node, segment| node.find(segment))
    }

    /// Visit this node and every descendant, depth first.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Element)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// Text of the node at `path`, if any.
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.at(path).and_then(|e| e.text.as_deref())
    }
}
