//! Filesystem-like addresses over the resource graph.
//!
//! `/virtual-network` is a collection, `/virtual-network/<uuid>` a resource,
//! `/` the root listing every type. Paths are normalised on construction
//! (`.`/`..`/duplicate separators) and never fail to build.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Parse `s` as a version 4 UUID.
pub fn parse_uuid4(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s)
        .ok()
        .filter(|u| u.get_version_num() == 4)
}

pub fn has_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

/// Immutable, normalised path. Joins return new values sharing nothing mutable.
///
/// The metadata map rides along for display purposes (resolvers stash the
/// fq_name there) and is ignored by equality and hashing.
#[derive(Clone)]
pub struct Path {
    segments: Arc<[String]>,
    absolute: bool,
    meta: BTreeMap<String, String>,
}

impl Path {
    pub fn root() -> Self {
        Self {
            segments: Arc::from(Vec::new()),
            absolute: true,
            meta: BTreeMap::new(),
        }
    }

    /// The empty string is the root; a relative string that normalises to
    /// nothing (`.`, `a/..`) stays relative and joins as a no-op.
    pub fn new(s: &str) -> Self {
        Self::from_segments(s.is_empty() || s.starts_with('/'), s.split('/'))
    }

    pub fn from_segments<I, S>(absolute: bool, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for seg in segments {
            match seg.as_ref() {
                "" | "." => {}
                ".." => match out.last() {
                    Some(last) if last != ".." => {
                        out.pop();
                    }
                    // `..` above the root stays at the root.
                    _ if absolute => {}
                    _ => out.push("..".to_string()),
                },
                other => out.push(other.to_string()),
            }
        }
        Self {
            absolute,
            segments: Arc::from(out),
            meta: BTreeMap::new(),
        }
    }

    /// `/type/uuid`.
    pub fn resource(type_name: &str, uuid: &Uuid) -> Self {
        Self::from_segments(true, [type_name.to_string(), uuid.to_string()])
    }

    /// `/type`, or the root for an empty type.
    pub fn collection(type_name: &str) -> Self {
        Self::from_segments(true, [type_name])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_collection(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn is_resource(&self) -> bool {
        self.uuid().is_some()
    }

    /// First segment: the resource type.
    pub fn type_name(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Last segment.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn uuid(&self) -> Option<Uuid> {
        if self.segments.len() != 2 {
            return None;
        }
        parse_uuid4(&self.segments[1])
    }

    pub fn join(&self, other: impl Into<Path>) -> Path {
        let other = other.into();
        if other.absolute {
            return other;
        }
        if other.segments.is_empty() {
            return self.clone();
        }
        Self::from_segments(
            self.absolute,
            self.segments.iter().chain(other.segments.iter()),
        )
    }

    /// Strip `base` when it is a prefix of `self`; otherwise return `self`.
    pub fn relative_to(&self, base: &Path) -> Path {
        let prefix = base.segments.len();
        if self.absolute != base.absolute
            || self.segments.len() < prefix
            || self.segments[..prefix] != base.segments[..]
        {
            return self.clone();
        }
        if self.segments.len() == prefix {
            return Self::root();
        }
        Self::from_segments(false, self.segments[prefix..].iter())
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.absolute == other.absolute && self.segments == other.segments
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.absolute.hash(state);
        self.segments.hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/")?;
        } else if self.segments.is_empty() {
            return write!(f, ".");
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::new(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::new(&s)
    }
}

impl From<&Path> for Path {
    fn from(p: &Path) -> Self {
        p.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "6b6a7f47-807e-4c39-8ac6-3adcf2f5498f";

    #[test]
    fn normalises_separators_and_dots() {
        assert_eq!(Path::new("//foo/./bar/").to_string(), "/foo/bar");
        assert_eq!(Path::new("/foo/../bar").to_string(), "/bar");
        assert_eq!(Path::new("/..").to_string(), "/");
        assert_eq!(Path::new("../foo").to_string(), "../foo");
        assert_eq!(Path::new(""), Path::root());
        assert!(Path::new("").is_absolute());
    }

    #[test]
    fn classifies_shapes() {
        assert!(Path::new("/").is_root());
        let col = Path::new("/foo");
        assert!(col.is_collection());
        assert!(!col.is_resource());

        let res = Path::new(&format!("/foo/{UUID}"));
        assert!(res.is_resource());
        assert_eq!(res.type_name(), Some("foo"));
        assert_eq!(res.name(), Some(UUID));

        assert!(!Path::new("/foo/bar").is_resource());
        // v1 uuid is not accepted
        assert!(!Path::new("/foo/a8098c1a-f86e-11da-bd1a-00112444be1e").is_resource());
    }

    #[test]
    fn join_and_relative_to() {
        let cwd = Path::new("/foo");
        assert_eq!(cwd.join(UUID).to_string(), format!("/foo/{UUID}"));
        assert_eq!(cwd.join("..").to_string(), "/");
        assert_eq!(cwd.join("/bar"), Path::new("/bar"));

        let res = cwd.join(UUID);
        assert_eq!(res.relative_to(&cwd).to_string(), UUID);
        assert!(!res.relative_to(&cwd).is_absolute());
        assert_eq!(res.relative_to(&Path::new("/bar")), res);
        assert_eq!(cwd.relative_to(&cwd), Path::root());
    }

    #[test]
    fn empty_relative_join_keeps_receiver() {
        let cwd = Path::new("/foo");
        assert_eq!(cwd.join("."), cwd);
        assert_eq!(cwd.join("bar/.."), cwd);
        assert_eq!(cwd.join("./bar/../."), cwd);

        let here = Path::new("bar/..");
        assert!(!here.is_absolute());
        assert!(here.segments().is_empty());
        assert_eq!(here.to_string(), ".");
        assert_eq!(Path::new("."), here);
        assert_ne!(here, Path::root());
    }

    #[test]
    fn meta_does_not_affect_equality() {
        let a = Path::new("/foo").with_meta("fq_name", "default:a");
        let b = Path::new("/foo");
        assert_eq!(a, b);
        assert_eq!(a.meta("fq_name"), Some("default:a"));
        assert_eq!(b.meta("fq_name"), None);
    }
}
