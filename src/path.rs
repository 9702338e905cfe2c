//! Hierarchical directory paths.
//!
//! A path is an ordered sequence of segments, each a `(name, layer-id)` pair.
//! The core only ever operates on absolute paths; [`FdbPath::parse`] accepts
//! the `/`-separated, `\`-escaped textual form used at the edges of an
//! application (config files, CLI arguments, logs).

use std::fmt;

use crate::error::DirError;

/// One element of a [`FdbPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// The human-readable name of this segment.
    pub name: String,
    /// The layer id declared for this segment, or empty if none was declared.
    /// Backfilled from the stored node's layer by the node finder when empty.
    pub layer: String,
}

impl PathSegment {
    /// A segment with no declared layer id.
    pub fn new(name: impl Into<String>) -> Self {
        PathSegment {
            name: name.into(),
            layer: String::new(),
        }
    }

    /// A segment with an explicit layer id.
    pub fn with_layer(name: impl Into<String>, layer: impl Into<String>) -> Self {
        PathSegment {
            name: name.into(),
            layer: layer.into(),
        }
    }
}

/// The reserved layer id used for intermediate partition roots.
pub const PARTITION_LAYER: &str = "partition";

/// An absolute directory path: an ordered list of `(name, layer-id)` segments.
///
/// The root path (zero segments) is never opened, moved, renamed, or removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FdbPath {
    segments: Vec<PathSegment>,
}

impl FdbPath {
    /// The root path.
    pub fn root() -> Self {
        FdbPath { segments: vec![] }
    }

    /// Builds a path from already-split segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        FdbPath { segments }
    }

    /// Builds a path of plain names with no layer ids declared.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FdbPath {
            segments: names.into_iter().map(PathSegment::new).collect(),
        }
    }

    /// Parses a `/`-separated textual path. `\` escapes a following `/` or `\`
    /// so a segment name may itself contain a literal slash. An empty segment
    /// (e.g. `//`, or a leading/trailing `/` beyond the root) is rejected.
    ///
    /// The textual form carries no layer ids; use [`FdbPath::with_layer`] to
    /// attach one to the last segment after parsing, or build the path with
    /// [`FdbPath::from_segments`] directly.
    pub fn parse(text: &str) -> Result<Self, DirError> {
        let text = text.strip_prefix('/').unwrap_or(text);
        if text.is_empty() {
            return Ok(FdbPath::root());
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped @ ('/' | '\\')) => current.push(escaped),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => {
                        return Err(DirError::InvalidPath {
                            reason: "trailing escape character".to_string(),
                        })
                    }
                },
                '/' => {
                    if current.is_empty() {
                        return Err(DirError::InvalidPath {
                            reason: "empty path segment".to_string(),
                        });
                    }
                    segments.push(PathSegment::new(std::mem::take(&mut current)));
                }
                other => current.push(other),
            }
        }

        if current.is_empty() {
            return Err(DirError::InvalidPath {
                reason: "empty path segment".to_string(),
            });
        }
        segments.push(PathSegment::new(current));

        Ok(FdbPath { segments })
    }

    /// Reverses [`FdbPath::parse`]: escapes `\` and `/` inside each segment's
    /// name and joins with `/`. Layer ids are not part of the textual form.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            for c in segment.name.chars() {
                if c == '\\' || c == '/' {
                    out.push('\\');
                }
                out.push(c);
            }
        }
        out
    }

    /// True if this is the root path (zero segments).
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if this path has zero segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Borrowed view of the segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The name of the last segment, if any.
    pub fn last_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.name.as_str())
    }

    /// The parent of this path. The parent of the root is the root itself.
    pub fn parent(&self) -> FdbPath {
        if self.segments.is_empty() {
            return FdbPath::root();
        }
        FdbPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// Appends a single named segment (with no declared layer) and returns
    /// the extended path.
    pub fn add(&self, name: impl Into<String>) -> FdbPath {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::new(name));
        FdbPath { segments }
    }

    /// Appends a sequence of segments and returns the extended path.
    pub fn join(&self, suffix: &[PathSegment]) -> FdbPath {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(suffix);
        FdbPath { segments }
    }

    /// Returns a copy of this path with the last segment's layer id replaced.
    /// A no-op on the root path.
    pub fn with_layer(&self, layer: impl Into<String>) -> FdbPath {
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            last.layer = layer.into();
        }
        FdbPath { segments }
    }

    /// True if `self`'s segment names are a prefix of `other`'s (including
    /// `self == other`). Layer ids are not compared.
    pub fn starts_with(&self, other: &FdbPath) -> bool {
        if other.segments.len() > self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a.name == b.name)
    }

    /// True if `self` is a strict descendant of `other`.
    pub fn is_child_of(&self, other: &FdbPath) -> bool {
        self.segments.len() > other.segments.len() && self.starts_with(other)
    }

    /// The suffix of `self` beyond the length of `prefix`. Panics if `prefix`
    /// is not a prefix of `self` by length (callers are expected to have
    /// already checked `starts_with`).
    pub fn suffix_after(&self, prefix_len: usize) -> Vec<PathSegment> {
        self.segments[prefix_len..].to_vec()
    }
}

impl fmt::Display for FdbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_and_format_round_trip() {
        let p = FdbPath::parse("/users/orders/2024").unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.format(), "/users/orders/2024");
    }

    #[test]
    fn root_parses_to_empty() {
        assert!(FdbPath::parse("").unwrap().is_root());
        assert!(FdbPath::parse("/").unwrap().is_root());
        assert_eq!(FdbPath::root().format(), "");
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(FdbPath::parse("/a//b").is_err());
        assert!(FdbPath::parse("/a/").is_err());
    }

    #[test]
    fn escapes_round_trip() {
        let raw = FdbPath::from_names(vec!["a/b", r"c\d"]);
        let text = raw.format();
        let reparsed = FdbPath::parse(&text).unwrap();
        assert_eq!(raw.segments()[0].name, reparsed.segments()[0].name);
        assert_eq!(raw.segments()[1].name, reparsed.segments()[1].name);
    }

    #[test]
    fn parent_of_root_is_root() {
        assert!(FdbPath::root().parent().is_root());
    }

    #[test]
    fn starts_with_and_is_child_of() {
        let parent = FdbPath::from_names(vec!["a"]);
        let child = FdbPath::from_names(vec!["a", "b"]);
        assert!(child.starts_with(&parent));
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_child_of(&child));
        assert!(parent.starts_with(&parent));
        assert!(!parent.is_child_of(&parent));
    }

    #[test]
    fn with_layer_only_touches_last_segment() {
        let p = FdbPath::from_names(vec!["a", "b"]).with_layer("mq");
        assert_eq!(p.segments()[0].layer, "");
        assert_eq!(p.segments()[1].layer, "mq");
    }

    proptest! {
        /// `parse . format` round-trips for any sequence of non-empty segment
        /// names, including names that themselves contain `/` or `\` and so
        /// force the escaping path in both directions.
        #[test]
        fn parse_format_round_trip(names in proptest::collection::vec("[a-zA-Z0-9/\\\\]{1,12}", 1..6)) {
            let original = FdbPath::from_names(names);
            let reparsed = FdbPath::parse(&original.format()).unwrap();
            prop_assert_eq!(reparsed.len(), original.len());
            for (a, b) in original.segments().iter().zip(reparsed.segments().iter()) {
                prop_assert_eq!(&a.name, &b.name);
            }
        }

        /// A path always starts with its own parent, and `is_child_of` is
        /// never reflexive.
        #[test]
        fn parent_is_always_a_prefix(names in proptest::collection::vec("[a-z]{1,6}", 1..6)) {
            let path = FdbPath::from_names(names);
            prop_assert!(path.starts_with(&path.parent()));
            prop_assert!(!path.parent().is_child_of(&path.parent()));
        }
    }
}
