//! The parsed form of a single denylist rule.

use std::collections::HashMap;

use multihash::Multihash;

use crate::status::Status;

// ── Rule dialects ─────────────────────────────────────────────────────────────

/// The rule dialects understood by the denylist parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `//<cidv0-or-hex>`, an opaque double-hash digest.
    DoubleHash,
    /// `/ipfs/<cid>[/<subpath>]` or `/ipld/<cid>[/<subpath>]`.
    IpfsOrIpld,
    /// `/ipns/<cid-or-domain>[/<subpath>]`.
    Ipns,
    /// A literal path rule.
    Path,
}

// ── Subpath matching ──────────────────────────────────────────────────────────

/// Matcher over a query subpath, derived from the rule text after the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpathMatcher {
    /// Matches only the empty subpath (a bare-key rule).
    Empty,
    /// Matches exactly this subpath.
    Exact(String),
    /// Matches the path itself and anything below it. An empty prefix
    /// (a bare `*`) matches every subpath, the empty one included.
    Prefix(String),
}

impl SubpathMatcher {
    /// Build a matcher from the raw subpath text of a rule. A trailing `*`
    /// selects prefix matching; surrounding slashes are trimmed.
    pub fn parse(raw: &str) -> Self {
        let (body, prefix) = match raw.strip_suffix('*') {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        let body = body.trim_matches('/');
        match (prefix, body.is_empty()) {
            (false, true) => SubpathMatcher::Empty,
            (false, false) => SubpathMatcher::Exact(body.to_string()),
            (true, _) => SubpathMatcher::Prefix(body.to_string()),
        }
    }

    /// Whether the query subpath matches. Surrounding slashes in the query
    /// are ignored, so an empty subpath and `/` are treated identically.
    pub fn matches(&self, subpath: &str) -> bool {
        let q = subpath.trim_matches('/');
        match self {
            SubpathMatcher::Empty => q.is_empty(),
            SubpathMatcher::Exact(p) => q == p,
            SubpathMatcher::Prefix(p) => {
                p.is_empty()
                    || q == p
                    || q.strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self, SubpathMatcher::Prefix(_))
    }

    /// The normalized path component; empty for bare-key matchers.
    pub fn path(&self) -> &str {
        match self {
            SubpathMatcher::Empty => "",
            SubpathMatcher::Exact(p) | SubpathMatcher::Prefix(p) => p,
        }
    }
}

// ── Entry ─────────────────────────────────────────────────────────────────────

/// One parsed denylist line.
#[derive(Debug, Clone)]
pub struct Entry {
    /// 1-based line number within the source file, header lines included.
    pub line: u64,
    /// The original rule text.
    pub raw: String,
    /// `true` when the rule is an allow-exception (`+` or `-` prefix).
    pub allow: bool,
    pub kind: RuleKind,
    /// Index key: the b58 multihash for hash rules, the name for IPNS
    /// domains, the normalized path for literal rules.
    pub key: String,
    /// Set for double-hash rules; its function code selects the bucket.
    pub multihash: Option<Multihash<64>>,
    pub path: SubpathMatcher,
    /// `k=v` tokens following the rule.
    pub hints: HashMap<String, String>,
}

/// Allow-override scan over entries that share one index key.
///
/// Entries are visited in file order. A matching allow-entry wins
/// immediately; otherwise the first matching deny-entry produces
/// [`Status::Blocked`]; no match at all is [`Status::NotFound`].
pub fn check_subpath(entries: &[Entry], subpath: &str) -> (Status, Option<Entry>) {
    let mut blocked: Option<&Entry> = None;
    for entry in entries {
        if !entry.path.matches(subpath) {
            continue;
        }
        if entry.allow {
            return (Status::Allowed, Some(entry.clone()));
        }
        if blocked.is_none() {
            blocked = Some(entry);
        }
    }
    match blocked {
        Some(entry) => (Status::Blocked, Some(entry.clone())),
        None => (Status::NotFound, None),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(allow: bool, path: SubpathMatcher) -> Entry {
        Entry {
            line: 1,
            raw: String::new(),
            allow,
            kind: RuleKind::IpfsOrIpld,
            key: "QmKey".into(),
            multihash: None,
            path,
            hints: HashMap::new(),
        }
    }

    #[test]
    fn matcher_parse() {
        assert_eq!(SubpathMatcher::parse(""), SubpathMatcher::Empty);
        assert_eq!(SubpathMatcher::parse("/"), SubpathMatcher::Empty);
        assert_eq!(SubpathMatcher::parse("*"), SubpathMatcher::Prefix(String::new()));
        assert_eq!(SubpathMatcher::parse("a/b"), SubpathMatcher::Exact("a/b".into()));
        assert_eq!(SubpathMatcher::parse("/a/b/"), SubpathMatcher::Exact("a/b".into()));
        assert_eq!(SubpathMatcher::parse("test*"), SubpathMatcher::Prefix("test".into()));
        assert_eq!(SubpathMatcher::parse("test/*"), SubpathMatcher::Prefix("test".into()));
    }

    #[test]
    fn empty_matches_only_empty() {
        let m = SubpathMatcher::Empty;
        assert!(m.matches(""));
        assert!(m.matches("/"));
        assert!(!m.matches("a"));
    }

    #[test]
    fn exact_matches_equal_paths() {
        let m = SubpathMatcher::parse("test");
        assert!(m.matches("test"));
        assert!(m.matches("/test/"));
        assert!(!m.matches("tes"));
        assert!(!m.matches("test/one"));
        assert!(!m.matches("one/test"));
    }

    #[test]
    fn prefix_matches_path_and_descendants() {
        let m = SubpathMatcher::parse("test*");
        assert!(m.matches("test"));
        assert!(m.matches("test/one"));
        assert!(!m.matches("test2"));
        assert!(!m.matches("tes"));
        assert!(!m.matches(""));
    }

    #[test]
    fn bare_star_matches_everything() {
        let m = SubpathMatcher::parse("*");
        assert!(m.matches(""));
        assert!(m.matches("a"));
        assert!(m.matches("a/b/c"));
    }

    #[test]
    fn check_subpath_allow_overrides_deny() {
        let entries = vec![
            entry(false, SubpathMatcher::Exact("sub".into())),
            entry(true, SubpathMatcher::Exact("sub".into())),
        ];
        let (status, matched) = check_subpath(&entries, "sub");
        assert_eq!(status, Status::Allowed);
        assert!(matched.unwrap().allow);
    }

    #[test]
    fn check_subpath_first_deny_wins() {
        let entries = vec![
            entry(false, SubpathMatcher::Prefix("sub".into())),
            entry(false, SubpathMatcher::Exact("sub".into())),
        ];
        let (status, matched) = check_subpath(&entries, "sub");
        assert_eq!(status, Status::Blocked);
        assert!(matched.unwrap().path.is_prefix());
    }

    #[test]
    fn check_subpath_no_match() {
        let entries = vec![entry(false, SubpathMatcher::Exact("sub".into()))];
        let (status, matched) = check_subpath(&entries, "other");
        assert_eq!(status, Status::NotFound);
        assert!(matched.is_none());
    }
}
