//! Denylist files: header, rule parsing, live tailing, and per-list queries.
//!
//! A denylist is an optional YAML header terminated by a `---` line,
//! followed by one rule per line. In follow mode the file handle stays open
//! after the initial parse and appended rules are ingested as the
//! filesystem reports writes, without re-reading the file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use cid::{Cid, Version};
use multihash::Multihash;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use gatefs_types::entry::{check_subpath, Entry, RuleKind, SubpathMatcher};
use gatefs_types::error::{BlockError, Result};
use gatefs_types::path::ContentPath;
use gatefs_types::status::{Status, StatusResponse};

use crate::content_id;
use crate::store::BlockDb;

/// Maximum header size. The `---` separator must appear within this budget.
const MAX_HEADER_BYTES: u64 = 1 << 10;

/// Hard cap on a single rule line. An overlong line aborts the list.
const MAX_LINE_BYTES: u64 = 2 << 20;

// ── Header ────────────────────────────────────────────────────────────────────

/// Parsed denylist header.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DenylistHeader {
    pub version: u32,
    pub name: String,
    pub description: String,
    pub author: String,
    pub hints: HashMap<String, String>,

    #[serde(skip)]
    header_bytes: u64,
    #[serde(skip)]
    header_lines: u64,
}

impl DenylistHeader {
    /// Read a header from the start of `r`. At most 1 KiB is consumed; if
    /// the `---` separator does not appear within that budget,
    /// [`BlockError::HeaderNotFound`] is returned. A separator with
    /// unparseable YAML in front of it yields the synthesized default
    /// header instead of failing the list.
    pub fn decode(r: &mut impl BufRead) -> Result<Self> {
        let mut limited = r.take(MAX_HEADER_BYTES);
        let mut raw: Vec<u8> = Vec::new();
        let mut lines = 0u64;
        loop {
            let mut line = Vec::new();
            limited.read_until(b'\n', &mut line)?;
            if !line.ends_with(b"\n") {
                return Err(BlockError::HeaderNotFound);
            }
            lines += 1;
            if line == b"---\n" {
                break;
            }
            raw.extend_from_slice(&line);
        }

        let mut header = if raw.is_empty() {
            DenylistHeader::default()
        } else {
            match serde_yaml::from_slice::<DenylistHeader>(&raw) {
                Ok(h) => h,
                Err(e) => {
                    warn!(%e, "malformed denylist header, using defaults");
                    DenylistHeader::synthesized(String::new())
                }
            }
        };
        header.header_bytes = raw.len() as u64;
        header.header_lines = lines;
        Ok(header)
    }

    /// The default header used when a file carries none.
    fn synthesized(name: String) -> Self {
        Self {
            version: 1,
            name,
            description: "No header found".to_string(),
            author: "unknown".to_string(),
            hints: HashMap::new(),
            header_bytes: 0,
            header_lines: 0,
        }
    }
}

impl std::fmt::Display for DenylistHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) by {}", self.name, self.description, self.author)
    }
}

// ── Denylist ──────────────────────────────────────────────────────────────────

/// A denylist file: its header, its parsed entries, and the indices used to
/// answer blocking queries. Optionally tails the file for appended rules.
#[derive(Debug)]
pub struct Denylist {
    pub header: DenylistHeader,
    pub filename: String,

    db: Arc<BlockDb>,
    watcher: Option<RecommendedWatcher>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Denylist {
    /// Open a denylist file and parse all of its entries.
    ///
    /// With `follow`, the file handle stays open and a filesystem watcher
    /// feeds appended rules into the indices until [`Denylist::close`].
    pub async fn open(path: impl AsRef<Path>, follow: bool) -> Result<Self> {
        let path = path.as_ref();
        let filename = path.to_string_lossy().into_owned();
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut dl = Denylist {
            header: DenylistHeader::default(),
            filename,
            db: Arc::new(BlockDb::default()),
            watcher: None,
            shutdown_tx: None,
        };
        dl.read_header(&mut reader)?;

        let mut line_number = dl.header.header_lines;
        let mut carry = Vec::new();
        parse_rules(&mut reader, &dl.db, &dl.filename, &mut line_number, &mut carry, !follow)?;

        if follow {
            dl.start_tail(path, reader, line_number, carry)?;
        }
        Ok(dl)
    }

    /// Parse a denylist from an in-memory or otherwise seekable source.
    /// The source is consumed to end-of-input; there is no follow mode.
    pub fn from_reader<R: Read + Seek>(r: R) -> Result<Self> {
        let mut reader = BufReader::new(r);
        let mut dl = Denylist {
            header: DenylistHeader::default(),
            filename: String::new(),
            db: Arc::new(BlockDb::default()),
            watcher: None,
            shutdown_tx: None,
        };
        dl.read_header(&mut reader)?;

        let mut line_number = dl.header.header_lines;
        let mut carry = Vec::new();
        parse_rules(&mut reader, &dl.db, &dl.filename, &mut line_number, &mut carry, true)?;
        Ok(dl)
    }

    /// Decode the header and leave `reader` positioned at the first rule
    /// line. A missing header falls back to the synthesized default and
    /// rewinds to offset 0.
    fn read_header<R: Read + Seek>(&mut self, reader: &mut BufReader<R>) -> Result<()> {
        match DenylistHeader::decode(reader) {
            Ok(header) => {
                self.header = header;
                if self.header.name.is_empty() {
                    self.header.name = basename(&self.filename);
                }
                info!(file = %self.filename, header = %self.header, "processing denylist");
                // The buffered reader read ahead; reposition past `---\n`.
                reader.seek(SeekFrom::Start(self.header.header_bytes + 4))?;
                Ok(())
            }
            Err(BlockError::HeaderNotFound) => {
                self.header = DenylistHeader::synthesized(basename(&self.filename));
                warn!(file = %self.filename, "no denylist header, using defaults");
                reader.seek(SeekFrom::Start(0))?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Attach the filesystem watcher and hand the positioned reader to the
    /// background tail task.
    fn start_tail(
        &mut self,
        path: &Path,
        reader: BufReader<File>,
        line_number: u64,
        carry: Vec<u8>,
    ) -> Result<()> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = event_tx.send(res.map_err(|e| e.to_string()));
            })
            .map_err(|e| BlockError::Watch(e.to_string()))?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| BlockError::Watch(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(tail_loop(
            reader,
            Arc::clone(&self.db),
            self.filename.clone(),
            line_number,
            carry,
            event_rx,
            shutdown_rx,
        ));

        self.watcher = Some(watcher);
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    /// Stop following the file and release the watcher. Idempotent; queries
    /// keep answering from the already-ingested entries.
    pub fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let mut result = Ok(());
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(Path::new(&self.filename)) {
                result = Err(BlockError::Watch(e.to_string()));
            }
        }
        result
    }

    /// Snapshot of every parsed entry, in file order.
    pub fn entries(&self) -> Vec<Entry> {
        self.db.entries()
    }

    /// The rule indices backing this denylist.
    pub fn db(&self) -> &BlockDb {
        &self.db
    }
}

// ── Queries ───────────────────────────────────────────────────────────────────

impl Denylist {
    fn respond(
        &self,
        status: Status,
        entry: Option<Entry>,
        cid: Option<Cid>,
        path: Option<ContentPath>,
    ) -> StatusResponse {
        StatusResponse {
            cid,
            path,
            status,
            filename: self.filename.clone(),
            entry,
            error: None,
        }
    }

    /// Blocking status of a bare subpath against the literal-path rules.
    pub fn is_subpath_blocked(&self, subpath: &str) -> StatusResponse {
        let subpath = subpath.trim_matches('/');
        let entries = self.db.lookup_path(subpath);
        let (status, entry) = check_subpath(&entries, subpath);
        if status != Status::NotFound {
            return self.respond(status, entry, None, None);
        }
        // Prefix rules need a linear scan; lists are expected to carry few.
        let (status, entry) = self.db.check_prefix_bucket(subpath);
        self.respond(status, entry, None, None)
    }

    /// Blocking status of an IPNS name and subpath. `name` is the bare
    /// name, not an `/ipns/…` path.
    pub fn is_ipns_path_blocked(&self, name: &str, subpath: &str) -> StatusResponse {
        let subpath = subpath.trim_matches('/');
        let preimage = content_id::preimage_ipns(name, subpath);
        let p = ContentPath::new(preimage.clone());

        // CID names are indexed by multihash; everything else by raw name.
        let key = match Cid::try_from(name) {
            Ok(c) => content_id::canonical_key(&c),
            Err(_) => name.to_string(),
        };
        let entries = self.db.lookup_ipns(&key);
        let (status, entry) = check_subpath(&entries, subpath);
        if status != Status::NotFound {
            return self.respond(status, entry, None, Some(p));
        }

        for code in self.db.double_hash_codes() {
            let double = match content_id::multihash_sum(code, preimage.as_bytes()) {
                Ok(mh) => mh,
                Err(e) => {
                    warn!(file = %self.filename, %e, "skipping double-hash probe");
                    continue;
                }
            };
            let digest = content_id::multihash_b58(&double);
            let entries = self.db.lookup_double_hash(code, &digest);
            let (status, entry) = check_subpath(&entries, "");
            if status != Status::NotFound {
                return self.respond(status, entry, None, Some(p));
            }
        }

        self.respond(Status::NotFound, None, None, Some(p))
    }

    /// Blocking status of an IPFS CID and subpath.
    pub fn is_ipfs_path_blocked(&self, cid_str: &str, subpath: &str) -> StatusResponse {
        self.is_ipfs_ipld_path_blocked(cid_str, subpath, "ipfs")
    }

    /// Blocking status of an IPLD CID and subpath.
    pub fn is_ipld_path_blocked(&self, cid_str: &str, subpath: &str) -> StatusResponse {
        self.is_ipfs_ipld_path_blocked(cid_str, subpath, "ipld")
    }

    fn is_ipfs_ipld_path_blocked(
        &self,
        cid_str: &str,
        subpath: &str,
        proto: &str,
    ) -> StatusResponse {
        let subpath = subpath.trim_matches('/');
        let p = ContentPath::new(if subpath.is_empty() {
            format!("/{proto}/{cid_str}")
        } else {
            format!("/{proto}/{cid_str}/{subpath}")
        });

        // CIDv0 strings already are the canonical b58 multihash; use them
        // directly and defer full parsing until a double-hash probe needs it.
        let mut cid: Option<Cid> = None;
        let key = if cid_str.len() == 46 && cid_str.starts_with("Qm") {
            cid_str.to_string()
        } else {
            match content_id::parse_cid(cid_str) {
                Ok(c) => {
                    let key = content_id::canonical_key(&c);
                    cid = Some(c);
                    key
                }
                Err(e) => {
                    warn!(file = %self.filename, cid = %cid_str, "could not decode CID");
                    return StatusResponse {
                        path: Some(p),
                        status: Status::Errored,
                        filename: self.filename.clone(),
                        error: Some(e),
                        ..Default::default()
                    };
                }
            }
        };

        let entries = self.db.lookup_ipfs(&key);
        let (status, entry) = check_subpath(&entries, subpath);
        if status != Status::NotFound {
            return self.respond(status, entry, None, Some(p));
        }

        // Double-hash probes need the parsed CID for the v1 pre-image.
        let c = match cid {
            Some(c) => c,
            None => match content_id::parse_cid(cid_str) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %self.filename, cid = %cid_str, "could not decode CID");
                    return StatusResponse {
                        path: Some(p),
                        status: Status::Errored,
                        filename: self.filename.clone(),
                        error: Some(e),
                        ..Default::default()
                    };
                }
            },
        };

        let legacy = content_id::preimage_v1(&c, subpath);
        let plain = content_id::preimage_b58(&key, subpath);
        for code in self.db.double_hash_codes() {
            for preimage in [legacy.as_str(), plain.as_str()] {
                let double = match content_id::multihash_sum(code, preimage.as_bytes()) {
                    Ok(mh) => mh,
                    Err(e) => {
                        warn!(file = %self.filename, %e, "skipping double-hash probe");
                        continue;
                    }
                };
                let digest = content_id::multihash_b58(&double);
                let entries = self.db.lookup_double_hash(code, &digest);
                let (status, entry) = check_subpath(&entries, "");
                if status != Status::NotFound {
                    return self.respond(status, entry, None, Some(p));
                }
            }
        }

        self.respond(Status::NotFound, None, None, Some(p))
    }

    /// Blocking status of a full `/proto/key[/sub…]` path, consulting the
    /// literal-path rules first and then dispatching on the protocol.
    pub fn is_path_blocked(&self, p: &ContentPath) -> StatusResponse {
        let segments = p.segments();
        if segments.len() < 2 {
            return StatusResponse {
                path: Some(p.clone()),
                status: Status::Errored,
                filename: self.filename.clone(),
                error: Some(BlockError::PathTooShort),
                ..Default::default()
            };
        }
        let proto = segments[0];
        let key = segments[1];
        let subpath = segments[2..].join("/");

        if !subpath.is_empty() {
            let mut resp = self.is_subpath_blocked(&subpath);
            if resp.status != Status::NotFound {
                resp.path = Some(p.clone());
                return resp;
            }
        }

        match proto {
            "ipns" => self.is_ipns_path_blocked(key, &subpath),
            "ipfs" => self.is_ipfs_ipld_path_blocked(key, &subpath, "ipfs"),
            "ipld" => self.is_ipfs_ipld_path_blocked(key, &subpath, "ipld"),
            _ => self.respond(Status::NotFound, None, None, Some(p.clone())),
        }
    }

    /// Blocking status of a bare CID: its multihash, then the double-hash
    /// rules that may cover it.
    pub fn is_cid_blocked(&self, c: &Cid) -> StatusResponse {
        let key = content_id::canonical_key(c);
        let entries = self.db.lookup_ipfs(&key);
        // An entry matching the empty subpath blocks the multihash itself.
        let (status, entry) = check_subpath(&entries, "");
        if status != Status::NotFound {
            return self.respond(status, entry, Some(*c), None);
        }

        // Legacy double-hash: sha2-256 of the v1 base32 form plus a slash.
        if self.db.has_double_hash(content_id::SHA2_256) {
            let preimage = content_id::preimage_v1(c, "");
            match content_id::multihash_sum(content_id::SHA2_256, preimage.as_bytes()) {
                Ok(double) => {
                    let digest = content_id::multihash_b58(&double);
                    let entries = self.db.lookup_double_hash(content_id::SHA2_256, &digest);
                    let (status, entry) = check_subpath(&entries, "");
                    if status != Status::NotFound {
                        return self.respond(status, entry, Some(*c), None);
                    }
                }
                Err(e) => {
                    return StatusResponse {
                        cid: Some(*c),
                        status: Status::Errored,
                        filename: self.filename.clone(),
                        error: Some(e),
                        ..Default::default()
                    };
                }
            }
        }

        // Any configured function may have double-hashed the key string.
        for code in self.db.double_hash_codes() {
            let double = match content_id::multihash_sum(code, key.as_bytes()) {
                Ok(mh) => mh,
                Err(e) => {
                    warn!(file = %self.filename, %e, "skipping double-hash probe");
                    continue;
                }
            };
            let digest = content_id::multihash_b58(&double);
            let entries = self.db.lookup_double_hash(code, &digest);
            let (status, entry) = check_subpath(&entries, "");
            if status != Status::NotFound {
                return self.respond(status, entry, Some(*c), None);
            }
        }

        self.respond(Status::NotFound, None, Some(*c), None)
    }
}

// ── Rule parsing ──────────────────────────────────────────────────────────────

/// Drain complete lines from `reader`, parsing each into the store.
///
/// A partially read line (no trailing newline yet) is left in `carry` for
/// the next call; with `eof_final` the carried text is parsed as a final
/// line instead, which is what a fully written file needs.
fn parse_rules<R: BufRead>(
    reader: &mut R,
    db: &BlockDb,
    filename: &str,
    line_number: &mut u64,
    carry: &mut Vec<u8>,
    eof_final: bool,
) -> Result<()> {
    loop {
        let budget = MAX_LINE_BYTES - carry.len() as u64;
        reader.by_ref().take(budget).read_until(b'\n', carry)?;

        if carry.ends_with(b"\n") {
            *line_number += 1;
            let line = String::from_utf8_lossy(carry).into_owned();
            if let Err(e) = parse_line(db, filename, &line, *line_number) {
                warn!(file = %filename, line = *line_number, %e, "skipping unparseable rule");
            }
            carry.clear();
            continue;
        }

        if carry.len() as u64 >= MAX_LINE_BYTES {
            return Err(BlockError::LineTooLong {
                file: filename.to_string(),
                line: *line_number + 1,
            });
        }

        // End of currently available input.
        if eof_final && !carry.is_empty() {
            *line_number += 1;
            let line = String::from_utf8_lossy(carry).into_owned();
            if let Err(e) = parse_line(db, filename, &line, *line_number) {
                warn!(file = %filename, line = *line_number, %e, "skipping unparseable rule");
            }
            carry.clear();
        }
        return Ok(());
    }
}

/// Intermediate result of parsing one rule body.
struct ParsedRule {
    kind: RuleKind,
    key: String,
    multihash: Option<Multihash<64>>,
    path: SubpathMatcher,
}

/// Parse one rule line and insert the resulting entry into the store.
/// Blank lines and comments are skipped.
fn parse_line(db: &BlockDb, filename: &str, line: &str, number: u64) -> Result<()> {
    let line = line.trim_end_matches('\n').trim_end_matches('\r');
    if line.is_empty() || line.starts_with('#') {
        return Ok(());
    }

    let mut fields = line.split_whitespace();
    let mut rule = match fields.next() {
        Some(rule) => rule,
        None => return Ok(()),
    };

    let mut hints = HashMap::new();
    for token in fields {
        if token.starts_with('#') {
            break;
        }
        if let Some((k, v)) = token.split_once('=') {
            hints.insert(k.to_string(), v.to_string());
        }
    }

    // Both prefixes declare an allow-rule.
    let mut allow = false;
    if let Some(stripped) = rule.strip_prefix('-').or_else(|| rule.strip_prefix('+')) {
        allow = true;
        rule = stripped;
    }

    let parsed = if let Some(body) = rule.strip_prefix("//") {
        parse_double_hash(body, filename, number)?
    } else if let Some(body) = rule
        .strip_prefix("/ipfs/")
        .or_else(|| rule.strip_prefix("/ipld/"))
    {
        parse_ipfs_ipld(body)?
    } else if let Some(body) = rule.strip_prefix("/ipns/") {
        parse_ipns(body)
    } else {
        parse_path_rule(rule)
    };

    debug!(
        file = %basename(filename),
        line = number,
        kind = ?parsed.kind,
        key = %parsed.key,
        "rule added"
    );

    db.insert(Entry {
        line: number,
        raw: line.to_string(),
        allow,
        kind: parsed.kind,
        key: parsed.key,
        multihash: parsed.multihash,
        path: parsed.path,
        hints,
    });
    Ok(())
}

/// `//<rule>`: a CIDv0 (raw multihash), or hex bytes taken as a sha2-256
/// digest. The multihash function code selects the double-hash bucket.
fn parse_double_hash(body: &str, filename: &str, number: u64) -> Result<ParsedRule> {
    let mh: Multihash<64> = match Cid::try_from(body) {
        Ok(c) => {
            if c.version() != Version::V0 {
                return Err(BlockError::CidV0Required {
                    file: filename.to_string(),
                    line: number,
                });
            }
            *c.hash()
        }
        Err(_) => {
            let digest =
                hex::decode(body).map_err(|_| BlockError::MalformedCid(body.to_string()))?;
            Multihash::wrap(content_id::SHA2_256, &digest)
                .map_err(|_| BlockError::MalformedCid(body.to_string()))?
        }
    };
    Ok(ParsedRule {
        kind: RuleKind::DoubleHash,
        key: content_id::multihash_b58(&mh),
        multihash: Some(mh),
        path: SubpathMatcher::Empty,
    })
}

/// Split a rule body into its key token and subpath matcher. A `*` attached
/// directly to the key (no slash) is a prefix match over everything below.
fn split_rule(body: &str) -> (&str, SubpathMatcher) {
    match body.split_once('/') {
        Some((key, sub)) => (key, SubpathMatcher::parse(sub)),
        None => match body.strip_suffix('*') {
            Some(key) => (key, SubpathMatcher::Prefix(String::new())),
            None => (body, SubpathMatcher::Empty),
        },
    }
}

/// `/ipfs/<cid>[/<subpath>]` and `/ipld/…`: indexed by canonical key.
fn parse_ipfs_ipld(body: &str) -> Result<ParsedRule> {
    let (cid_str, path) = split_rule(body);
    let c = content_id::parse_cid(cid_str)?;
    Ok(ParsedRule {
        kind: RuleKind::IpfsOrIpld,
        key: content_id::canonical_key(&c),
        multihash: None,
        path,
    })
}

/// `/ipns/<name>[/<subpath>]`: CID names are indexed by canonical key,
/// anything else by the raw domain string.
fn parse_ipns(body: &str) -> ParsedRule {
    let (name, path) = split_rule(body);
    let key = match Cid::try_from(name) {
        Ok(c) => content_id::canonical_key(&c),
        Err(_) => name.to_string(),
    };
    ParsedRule {
        kind: RuleKind::Ipns,
        key,
        multihash: None,
        path,
    }
}

/// A literal path rule: exact rules are indexed, prefix rules go to the
/// linear-scan bucket.
fn parse_path_rule(rule: &str) -> ParsedRule {
    let path = SubpathMatcher::parse(rule);
    ParsedRule {
        kind: RuleKind::Path,
        key: path.path().to_string(),
        multihash: None,
        path,
    }
}

fn basename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

// ── Tailing ───────────────────────────────────────────────────────────────────

/// Background task that keeps a followed denylist current.
///
/// Blocks on filesystem write events and drains appended lines as they
/// complete. Exits on shutdown, on watcher failure, or on an oversized
/// line.
async fn tail_loop(
    mut reader: BufReader<File>,
    db: Arc<BlockDb>,
    filename: String,
    mut line_number: u64,
    mut carry: Vec<u8>,
    mut events: mpsc::UnboundedReceiver<std::result::Result<notify::Event, String>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        if let Err(e) =
            parse_rules(&mut reader, &db, &filename, &mut line_number, &mut carry, false)
        {
            warn!(file = %filename, %e, "stopping denylist tail");
            return;
        }

        // Wait for the next write, then go read again.
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(Ok(ev)) if matches!(ev.kind, notify::EventKind::Modify(_)) => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(file = %filename, %e, "denylist watcher failed");
                        return;
                    }
                    None => {
                        debug!(file = %filename, "watcher channel closed");
                        return;
                    }
                },
                _ = &mut shutdown => {
                    debug!(file = %filename, "denylist tail shutting down");
                    return;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write as _};
    use std::time::Duration;

    const SAMPLE: &str = "\
version: 1
name: sample
description: unit fixture
author: tests
hints:
  a: b
---
# a comment
/ipfs/bafybeihvvulpp4evxj7x7armbqcyg6uezzuig6jp3lktpbovlqfkuqeuoq
/ipfs/QmdWFA9FL52hx3j9EJZPQP1ZUH8Ygi5tLCX2cRDs6knSf8/sub status=6 reason=test
+/ipns/ok.example
//QmVTF1yEejXd9iMgoRTFDxBv7HAz9kuZcQNBzHrceuK9HR

my/literal/path
my/prefix*
";

    fn parse(list: &str) -> Denylist {
        Denylist::from_reader(Cursor::new(list.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn header_fields_and_hints() {
        let dl = parse(SAMPLE);
        assert_eq!(dl.header.version, 1);
        assert_eq!(dl.header.name, "sample");
        assert_eq!(dl.header.author, "tests");
        assert_eq!(dl.header.hints.get("a").map(String::as_str), Some("b"));
        assert_eq!(dl.header.to_string(), "sample (unit fixture) by tests");
    }

    #[test]
    fn rules_parse_into_entries() {
        let dl = parse(SAMPLE);
        let entries = dl.entries();
        assert_eq!(entries.len(), 6);

        assert_eq!(entries[0].kind, RuleKind::IpfsOrIpld);
        assert_eq!(entries[0].line, 9);
        assert!(!entries[0].allow);

        assert_eq!(entries[1].kind, RuleKind::IpfsOrIpld);
        assert_eq!(entries[1].key, "QmdWFA9FL52hx3j9EJZPQP1ZUH8Ygi5tLCX2cRDs6knSf8");
        assert_eq!(entries[1].path, SubpathMatcher::Exact("sub".into()));
        assert_eq!(entries[1].hints.get("status").map(String::as_str), Some("6"));
        assert_eq!(entries[1].hints.get("reason").map(String::as_str), Some("test"));

        assert_eq!(entries[2].kind, RuleKind::Ipns);
        assert!(entries[2].allow);
        assert_eq!(entries[2].key, "ok.example");

        assert_eq!(entries[3].kind, RuleKind::DoubleHash);
        assert_eq!(
            entries[3].multihash.unwrap().code(),
            crate::content_id::SHA2_256
        );

        assert_eq!(entries[4].kind, RuleKind::Path);
        assert_eq!(entries[4].key, "my/literal/path");
        assert_eq!(entries[5].kind, RuleKind::Path);
        assert!(entries[5].path.is_prefix());
    }

    #[test]
    fn missing_header_falls_back_to_defaults() {
        let dl = parse("/ipns/one.example");
        assert_eq!(dl.header.version, 1);
        assert_eq!(dl.header.description, "No header found");
        assert_eq!(dl.header.author, "unknown");
        // The whole input is still parsed as rules from offset 0.
        assert_eq!(dl.entries().len(), 1);
    }

    #[test]
    fn bare_separator_header_is_accepted() {
        let dl = parse("---\n/ipns/one.example\n");
        assert_eq!(dl.entries().len(), 1);
        assert_eq!(dl.entries()[0].line, 2);
    }

    #[test]
    fn malformed_header_yaml_uses_defaults() {
        let dl = parse(":[ this is not yaml\n---\n/ipns/one.example\n");
        assert_eq!(dl.header.version, 1);
        assert_eq!(dl.header.description, "No header found");
        // Parsing resumes after the separator, not at offset 0.
        assert_eq!(dl.entries().len(), 1);
        assert_eq!(dl.entries()[0].key, "one.example");
    }

    #[test]
    fn header_boundary_at_exactly_1_kib() {
        let mut head = String::from("name: bounds\ndescription: ");
        while head.len() < 1019 {
            head.push('x');
        }
        head.push('\n'); // 1020 bytes of header + 4 bytes of separator
        assert_eq!(head.len(), 1020);

        let mut ok = Cursor::new(format!("{head}---\n"));
        let header = DenylistHeader::decode(&mut std::io::BufReader::new(&mut ok)).unwrap();
        assert_eq!(header.name, "bounds");

        let mut over = Cursor::new(format!("{head}x---\n"));
        let err = DenylistHeader::decode(&mut std::io::BufReader::new(&mut over)).unwrap_err();
        assert!(matches!(err, BlockError::HeaderNotFound));
    }

    #[test]
    fn oversized_line_aborts_the_list() {
        let list = format!("---\n{}", "a".repeat((MAX_LINE_BYTES + 10) as usize));
        let err = Denylist::from_reader(Cursor::new(list.into_bytes())).unwrap_err();
        assert!(matches!(err, BlockError::LineTooLong { .. }));
    }

    #[test]
    fn final_line_without_newline_is_parsed() {
        let dl = parse("---\n/ipns/one.example\n/ipns/two.example");
        assert_eq!(dl.entries().len(), 2);
        assert_eq!(dl.entries()[1].key, "two.example");
    }

    #[test]
    fn crlf_line_endings() {
        let dl = parse("/ipns/one.example\r\n/ipns/two.example\r\n");
        let entries = dl.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "one.example");
        assert_eq!(entries[1].key, "two.example");
    }

    #[test]
    fn non_v0_double_hash_is_skipped() {
        let dl = parse(
            "---\n//bafybeihvvulpp4evxj7x7armbqcyg6uezzuig6jp3lktpbovlqfkuqeuoq\n/ipns/ok.example\n",
        );
        // The invalid rule is logged and dropped; parsing continues.
        assert_eq!(dl.entries().len(), 1);
        assert_eq!(dl.entries()[0].key, "ok.example");
    }

    #[test]
    fn hex_double_hash_rule() {
        let digest = "d9d295bde21f422d471a90f2a37ec53049fdf3e5fa3ee2e8f20e10003da429e7";
        let dl = parse(&format!("---\n//{digest}\n"));
        let entries = dl.entries();
        assert_eq!(entries.len(), 1);
        let mh = entries[0].multihash.unwrap();
        assert_eq!(mh.code(), crate::content_id::SHA2_256);
        assert_eq!(hex::encode(mh.digest()), digest);
    }

    #[test]
    fn whitespace_and_comment_lines_are_skipped() {
        let dl = parse("---\n\n   \n# comment\n/ipns/ok.example # trailing note\n");
        let entries = dl.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].hints.is_empty());
    }

    #[tokio::test]
    async fn follow_ingests_appended_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.deny");
        std::fs::write(&path, "version: 1\nname: live\n---\n/ipns/one.example\n").unwrap();

        let mut dl = Denylist::open(&path, true).await.unwrap();
        assert_eq!(dl.entries().len(), 1);

        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "/ipns/two.example").unwrap();
            writeln!(file, "/ipns/three.example").unwrap();
            file.flush().unwrap();
        }

        let mut ingested = false;
        for _ in 0..200 {
            if dl.entries().len() == 3 {
                ingested = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(ingested, "appended rules were not ingested");

        assert_eq!(dl.is_ipns_path_blocked("two.example", "").status, Status::Blocked);
        assert_eq!(dl.is_ipns_path_blocked("three.example", "").status, Status::Blocked);

        // Tailing yields the same index state as a fresh parse of the file.
        let fresh = Denylist::from_reader(Cursor::new(std::fs::read(&path).unwrap())).unwrap();
        assert_eq!(fresh.entries().len(), dl.entries().len());

        dl.close().unwrap();
        dl.close().unwrap(); // idempotent
    }

    #[tokio::test]
    async fn open_without_follow_holds_no_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static.deny");
        std::fs::write(&path, "---\n/ipns/one.example\n").unwrap();

        let mut dl = Denylist::open(&path, false).await.unwrap();
        assert_eq!(dl.entries().len(), 1);
        assert_eq!(dl.header.name, "static.deny");
        dl.close().unwrap();
    }
}
