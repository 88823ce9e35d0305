//! OSM-style key/value tags attached to map elements

use serde::Serialize;
use std::fmt;

/// Key of the localized name tag.
pub const KEY_NAME: &str = "name";
/// Key of the house number tag.
pub const KEY_HOUSE_NUMBER: &str = "addr:housenumber";
/// Key of the route reference tag.
pub const KEY_REF: &str = "ref";
/// Key of the elevation tag.
pub const KEY_ELE: &str = "ele";

/// An immutable key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    /// Tag key, e.g. `highway`
    pub key: String,
    /// Tag value, e.g. `residential`
    pub value: String,
}

impl Tag {
    /// Create a tag from its parts.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a dictionary entry of the form `key=value`.
    ///
    /// Only the first `=` separates; the value may contain further `=`
    /// characters. An entry without `=` becomes a key with an empty value.
    pub fn parse(entry: &str) -> Self {
        match entry.split_once('=') {
            Some((key, value)) => Self::new(key, value),
            None => Self::new(entry, ""),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered tags of one map element. Duplicate keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all tags, keeping the allocation.
    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Append a tag.
    pub fn add(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// First tag with the given key.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.key == key)
    }

    /// Value of the first tag with the given key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|t| t.value.as_str())
    }

    /// Whether any tag carries `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    /// Tags as a slice.
    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}
