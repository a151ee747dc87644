//! Content paths of the form `/<protocol>/<key>[/<subpath>…]`.

use std::fmt;

/// A slash-separated content path such as `/ipfs/<cid>/dir/file` or
/// `/ipns/<name>`. Purely textual; no validation happens at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPath(String);

impl ContentPath {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path split into segments, with surrounding slashes trimmed.
    /// `/ipfs/Qm…/a/b` yields `["ipfs", "Qm…", "a", "b"]`.
    pub fn segments(&self) -> Vec<&str> {
        let trimmed = self.0.trim_matches('/');
        if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        }
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentPath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_split_and_trim() {
        let p = ContentPath::from("/ipfs/QmABC/a/b");
        assert_eq!(p.segments(), vec!["ipfs", "QmABC", "a", "b"]);

        let trailing = ContentPath::from("/ipfs/QmABC/z/");
        assert_eq!(trailing.segments(), vec!["ipfs", "QmABC", "z"]);
    }

    #[test]
    fn segments_of_short_paths() {
        assert_eq!(ContentPath::from("/ipfs").segments(), vec!["ipfs"]);
        assert!(ContentPath::from("/").segments().is_empty());
        assert!(ContentPath::from("").segments().is_empty());
    }
}
