//! Fragments and Materialized Paths
//!
//! This module defines the value types of the path encoding:
//!
//! - `Fragment` - a single node's identifying segment
//! - `MaterializedPath` - the dot-joined sequence of fragments from a root to a node
//!
//! `MaterializedPath` is the Rust half of the path type: containment, level,
//! subpath extraction, and the common-ancestor aggregate all operate on whole
//! segments, never on raw characters. The SQL half lives in `db::path_column`.
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::models::{Fragment, MaterializedPath};
//!
//! let root = MaterializedPath::root(&Fragment::from(1));
//! let child = root.child(&Fragment::from(2));
//!
//! assert_eq!(child.as_str(), "1.2");
//! assert_eq!(child.level(), 2);
//! assert!(root.is_ancestor_of(&child));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Separator between path segments
pub const PATH_SEPARATOR: char = '.';

/// Identifying value of a single node, used as one segment of its path
///
/// Integer identifiers are rendered in decimal. A fragment is never empty and
/// never contains [`PATH_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fragment(String);

impl Fragment {
    /// Parse a fragment, rejecting empty values and values containing the separator
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::InvalidFragment(
                "fragment cannot be empty".to_string(),
            ));
        }
        if value.contains(PATH_SEPARATOR) {
            return Err(ValidationError::InvalidFragment(format!(
                "fragment '{}' contains the path separator '{}'",
                value, PATH_SEPARATOR
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Fragment {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for Fragment {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Fragment {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Fragment> for String {
    fn from(fragment: Fragment) -> Self {
        fragment.0
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered sequence of fragments from a root to a node, inclusive
///
/// Stored as the segments joined with [`PATH_SEPARATOR`] (e.g. `"1.4.2.3"`).
/// Lexicographic ordering of the encoded form places every node directly
/// before its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MaterializedPath(String);

impl MaterializedPath {
    /// Path of a root node: just its own fragment
    pub fn root(fragment: &Fragment) -> Self {
        Self(fragment.0.clone())
    }

    /// Path of a child of this path
    pub fn child(&self, fragment: &Fragment) -> Self {
        Self(format!("{}{}{}", self.0, PATH_SEPARATOR, fragment.0))
    }

    /// Parse an encoded path, validating every segment
    pub fn parse(encoded: &str) -> Result<Self, ValidationError> {
        Self::from_segments(encoded.split(PATH_SEPARATOR)).map_err(|e| {
            ValidationError::InvalidPath(format!("'{}': {}", encoded, e))
        })
    }

    fn from_segments<'a>(
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ValidationError> {
        let mut encoded = String::new();
        for segment in segments {
            let fragment = Fragment::new(segment)?;
            if !encoded.is_empty() {
                encoded.push(PATH_SEPARATOR);
            }
            encoded.push_str(fragment.as_str());
        }
        if encoded.is_empty() {
            return Err(ValidationError::InvalidPath("path cannot be empty".to_string()));
        }
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> std::str::Split<'_, char> {
        self.0.split(PATH_SEPARATOR)
    }

    /// Number of segments; equals the 1-based depth of the node
    pub fn level(&self) -> usize {
        self.segments().count()
    }

    /// Last segment (the node's own fragment)
    pub fn last_segment(&self) -> &str {
        self.segments().next_back().unwrap_or(&self.0)
    }

    /// First segment as a path (the root's path)
    pub fn root_path(&self) -> MaterializedPath {
        Self(self.segments().next().unwrap_or(&self.0).to_string())
    }

    /// Path made of the segments from `offset` onward (0-based)
    ///
    /// Returns `None` when `offset` is at or beyond the last segment.
    pub fn subpath(&self, offset: usize) -> Option<MaterializedPath> {
        if offset >= self.level() {
            return None;
        }
        let rest: Vec<&str> = self.segments().skip(offset).collect();
        Some(Self(rest.join(&PATH_SEPARATOR.to_string())))
    }

    /// Path made of the first `len` segments
    pub fn prefix(&self, len: usize) -> Option<MaterializedPath> {
        if len == 0 || len > self.level() {
            return None;
        }
        let head: Vec<&str> = self.segments().take(len).collect();
        Some(Self(head.join(&PATH_SEPARATOR.to_string())))
    }

    /// Every prefix from the root path to this path, shortest first
    pub fn prefixes(&self) -> Vec<MaterializedPath> {
        (1..=self.level()).filter_map(|len| self.prefix(len)).collect()
    }

    /// `self` is a prefix of `other` or equal to it
    pub fn contains(&self, other: &MaterializedPath) -> bool {
        other.0 == self.0 || self.is_ancestor_of(other)
    }

    /// `self` is a strict prefix of `other`
    pub fn is_ancestor_of(&self, other: &MaterializedPath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0[self.0.len()..].starts_with(PATH_SEPARATOR)
    }

    /// `self` is a strict descendant of `other`
    pub fn is_descendant_of(&self, other: &MaterializedPath) -> bool {
        other.is_ancestor_of(self)
    }

    /// Whether `fragment` appears anywhere in this path as a whole segment
    pub fn contains_segment(&self, fragment: &Fragment) -> bool {
        self.segments().any(|segment| segment == fragment.as_str())
    }

    /// Lowest common ancestor of a set of paths
    ///
    /// Follows the `ltree` `lca()` aggregate: the longest segment-aligned prefix
    /// shared by every input that is also a strict ancestor of every input.
    /// Returns `None` for an empty set or when the inputs share no segment.
    pub fn lowest_common_ancestor<'a, I>(paths: I) -> Option<MaterializedPath>
    where
        I: IntoIterator<Item = &'a MaterializedPath>,
    {
        paths
            .into_iter()
            .fold(CommonAncestor::new(), |mut acc, path| {
                acc.push(path);
                acc
            })
            .finish()
    }
}

/// Running state of the lowest common ancestor aggregate
///
/// Paths are pushed one at a time, so a caller reading rows from a cursor
/// never holds more than the shared prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonAncestor {
    common: Option<Vec<String>>,
    shortest: usize,
}

impl CommonAncestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &MaterializedPath) {
        let length = path.segments().count();
        match &mut self.common {
            None => {
                self.common = Some(path.segments().map(str::to_string).collect());
                self.shortest = length;
            }
            Some(common) => {
                self.shortest = self.shortest.min(length);
                let shared = common
                    .iter()
                    .zip(path.segments())
                    .take_while(|(a, b)| a.as_str() == *b)
                    .count();
                common.truncate(shared);
            }
        }
    }

    /// The aggregate over every path pushed so far
    pub fn finish(self) -> Option<MaterializedPath> {
        let mut common = self.common?;
        // An ancestor is always shorter than the shortest input
        common.truncate(self.shortest.saturating_sub(1));
        if common.is_empty() {
            return None;
        }
        Some(MaterializedPath(common.join(&PATH_SEPARATOR.to_string())))
    }
}

impl FromStr for MaterializedPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MaterializedPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MaterializedPath> for String {
    fn from(path: MaterializedPath) -> Self {
        path.0
    }
}

impl fmt::Display for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> MaterializedPath {
        MaterializedPath::parse(s).unwrap()
    }

    #[test]
    fn test_fragment_rejects_separator_and_empty() {
        assert!(Fragment::new("").is_err());
        assert!(Fragment::new("a.b").is_err());
        assert_eq!(Fragment::new("abc").unwrap().as_str(), "abc");
        assert_eq!(Fragment::from(42).as_str(), "42");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(MaterializedPath::parse("").is_err());
        assert!(MaterializedPath::parse("1..2").is_err());
        assert!(MaterializedPath::parse("1.2.").is_err());
        assert_eq!(path("1.2.3").level(), 3);
    }

    #[test]
    fn test_child_appends_segment() {
        let root = MaterializedPath::root(&Fragment::from(1));
        assert_eq!(root.as_str(), "1");
        assert_eq!(root.child(&Fragment::from(2)).as_str(), "1.2");
    }

    #[test]
    fn test_containment_is_segment_aligned() {
        assert!(path("1").is_ancestor_of(&path("1.2")));
        assert!(!path("1").is_ancestor_of(&path("12.3")));
        assert!(!path("1.2").is_ancestor_of(&path("1.2")));
        assert!(path("1.2").contains(&path("1.2")));
        assert!(path("1.2.3").is_descendant_of(&path("1")));
    }

    #[test]
    fn test_subpath_and_prefixes() {
        let p = path("1.4.2.3");
        assert_eq!(p.subpath(2).unwrap().as_str(), "2.3");
        assert!(p.subpath(4).is_none());
        assert_eq!(p.root_path().as_str(), "1");
        assert_eq!(p.last_segment(), "3");
        let prefixes: Vec<String> = p.prefixes().into_iter().map(String::from).collect();
        assert_eq!(prefixes, vec!["1", "1.4", "1.4.2", "1.4.2.3"]);
    }

    #[test]
    fn test_contains_segment() {
        let p = path("1.22.3");
        assert!(p.contains_segment(&Fragment::from(22)));
        assert!(!p.contains_segment(&Fragment::from(2)));
    }

    #[test]
    fn test_lowest_common_ancestor() {
        let paths = [path("1.2.3"), path("1.2.4.5")];
        assert_eq!(
            MaterializedPath::lowest_common_ancestor(&paths).unwrap().as_str(),
            "1.2"
        );

        // Never returns one of the inputs itself
        let nested = [path("1.2"), path("1.2.3")];
        assert_eq!(
            MaterializedPath::lowest_common_ancestor(&nested).unwrap().as_str(),
            "1"
        );

        let disjoint = [path("1.2"), path("7.8")];
        assert!(MaterializedPath::lowest_common_ancestor(&disjoint).is_none());

        let empty: [MaterializedPath; 0] = [];
        assert!(MaterializedPath::lowest_common_ancestor(&empty).is_none());
    }

    #[test]
    fn test_common_ancestor_accumulates_incrementally() {
        let mut acc = CommonAncestor::new();
        assert_eq!(acc.clone().finish(), None);

        acc.push(&path("1.2.3.4"));
        assert_eq!(acc.clone().finish(), Some(path("1.2.3")));

        acc.push(&path("1.2.5"));
        assert_eq!(acc.clone().finish(), Some(path("1.2")));

        // A shorter input caps the result below itself
        acc.push(&path("1.2"));
        assert_eq!(acc.clone().finish(), Some(path("1")));

        acc.push(&path("9"));
        assert_eq!(acc.finish(), None);
    }

    #[test]
    fn test_lca_does_not_split_segments() {
        let paths = [path("1.23"), path("1.24")];
        assert_eq!(
            MaterializedPath::lowest_common_ancestor(&paths).unwrap().as_str(),
            "1"
        );
    }
}
