//! Per-denylist in-memory rule indices.
//!
//! Five indices keyed by canonical hashes and literal paths, plus an ordered
//! bucket of prefix rules that must be scanned linearly. All of them sit
//! behind a single read/write lock: queries take the read lock, and the
//! write lock is held only while one parsed entry is inserted, so lookups
//! proceed concurrently while a list is being tailed.

use std::collections::HashMap;

use parking_lot::RwLock;

use gatefs_types::entry::{check_subpath, Entry, RuleKind};
use gatefs_types::status::Status;

/// The rule indices of one denylist. Entries are only ever appended;
/// within every bucket they keep file order.
#[derive(Default, Debug)]
pub struct BlockDb {
    inner: RwLock<Indices>,
}

#[derive(Default, Debug)]
struct Indices {
    /// canonical key (b58 multihash) → entries for `/ipfs/` and `/ipld/` rules.
    ipfs: HashMap<String, Vec<Entry>>,
    /// name key (b58 multihash or raw domain) → entries for `/ipns/` rules.
    ipns: HashMap<String, Vec<Entry>>,
    /// hash function code → digest-b58 → entries, grouped so the engine
    /// probes each configured function once.
    double_hash: HashMap<u64, HashMap<String, Vec<Entry>>>,
    /// normalized literal subpath → exact-match entries.
    path: HashMap<String, Vec<Entry>>,
    /// prefix path rules, in file order.
    path_prefix: Vec<Entry>,
    /// every entry, in file order.
    entries: Vec<Entry>,
}

impl BlockDb {
    /// Insert a parsed entry into the index selected by its rule kind.
    pub fn insert(&self, entry: Entry) {
        let mut idx = self.inner.write();
        match entry.kind {
            RuleKind::IpfsOrIpld => {
                idx.ipfs.entry(entry.key.clone()).or_default().push(entry.clone());
            }
            RuleKind::Ipns => {
                idx.ipns.entry(entry.key.clone()).or_default().push(entry.clone());
            }
            RuleKind::DoubleHash => {
                let code = entry
                    .multihash
                    .as_ref()
                    .map(|mh| mh.code())
                    .unwrap_or(crate::content_id::SHA2_256);
                idx.double_hash
                    .entry(code)
                    .or_default()
                    .entry(entry.key.clone())
                    .or_default()
                    .push(entry.clone());
            }
            RuleKind::Path => {
                if entry.path.is_prefix() {
                    idx.path_prefix.push(entry.clone());
                } else {
                    idx.path.entry(entry.key.clone()).or_default().push(entry.clone());
                }
            }
        }
        idx.entries.push(entry);
    }

    // ── Query primitives ──────────────────────────────────────────────────────

    pub fn lookup_ipfs(&self, key: &str) -> Vec<Entry> {
        self.inner.read().ipfs.get(key).cloned().unwrap_or_default()
    }

    pub fn lookup_ipns(&self, key: &str) -> Vec<Entry> {
        self.inner.read().ipns.get(key).cloned().unwrap_or_default()
    }

    pub fn lookup_double_hash(&self, code: u64, digest_b58: &str) -> Vec<Entry> {
        self.inner
            .read()
            .double_hash
            .get(&code)
            .and_then(|bucket| bucket.get(digest_b58))
            .cloned()
            .unwrap_or_default()
    }

    pub fn lookup_path(&self, subpath: &str) -> Vec<Entry> {
        self.inner.read().path.get(subpath).cloned().unwrap_or_default()
    }

    /// Hash function codes with at least one double-hash rule.
    pub fn double_hash_codes(&self) -> Vec<u64> {
        self.inner.read().double_hash.keys().copied().collect()
    }

    pub fn has_double_hash(&self, code: u64) -> bool {
        self.inner.read().double_hash.contains_key(&code)
    }

    /// Linear allow-override scan of the prefix path rules.
    pub fn check_prefix_bucket(&self, subpath: &str) -> (Status, Option<Entry>) {
        check_subpath(&self.inner.read().path_prefix, subpath)
    }

    /// Snapshot of every entry, in file order.
    pub fn entries(&self) -> Vec<Entry> {
        self.inner.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
