//! Multi-denylist decision engine.
//!
//! A [`Blocker`] owns every loaded denylist and answers blocking queries by
//! delegating to each list in load order. Allow-overrides are resolved
//! inside each list; across lists the first decisive verdict wins.

use std::path::PathBuf;

use cid::Cid;
use tracing::{info, warn};

use gatefs_types::config::BlockerConfig;
use gatefs_types::error::Result;
use gatefs_types::path::ContentPath;
use gatefs_types::status::{Status, StatusResponse};

use crate::denylist::Denylist;
use crate::discover;

/// The top-level query interface of the engine.
pub struct Blocker {
    /// Loaded denylists, in load order.
    pub denylists: Vec<Denylist>,
}

impl Blocker {
    /// Open, parse, and follow every given denylist file.
    pub async fn new(files: &[PathBuf]) -> Result<Self> {
        Self::open(files, true).await
    }

    /// Open and parse every given denylist file, following each one when
    /// `follow` is set. On failure the lists opened so far are closed
    /// before the error is returned.
    pub async fn open(files: &[PathBuf], follow: bool) -> Result<Self> {
        let mut denylists: Vec<Denylist> = Vec::with_capacity(files.len());
        for file in files {
            match Denylist::open(file, follow).await {
                Ok(dl) => {
                    info!(file = %file.display(), rules = dl.entries().len(), "denylist loaded");
                    denylists.push(dl);
                }
                Err(e) => {
                    for mut dl in denylists {
                        let _ = dl.close();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { denylists })
    }

    /// Discover `.deny` files in the configured directories and open them,
    /// following them when the config asks for it.
    pub async fn from_config(config: &BlockerConfig) -> Result<Self> {
        let files = discover::denylist_files(config)?;
        Self::open(&files, config.follow).await
    }

    /// Build a blocker from already-opened denylists.
    pub fn from_denylists(denylists: Vec<Denylist>) -> Self {
        Self { denylists }
    }

    /// Whether a bare CID is blocked by any loaded denylist.
    pub fn is_cid_blocked(&self, c: &Cid) -> StatusResponse {
        for dl in &self.denylists {
            let resp = dl.is_cid_blocked(c);
            if resp.status != Status::NotFound {
                return resp;
            }
        }
        StatusResponse {
            cid: Some(*c),
            ..Default::default()
        }
    }

    /// Whether a `/proto/key[/sub…]` path is blocked by any loaded denylist.
    pub fn is_path_blocked(&self, p: &ContentPath) -> StatusResponse {
        for dl in &self.denylists {
            let resp = dl.is_path_blocked(p);
            if resp.status != Status::NotFound {
                return resp;
            }
        }
        StatusResponse {
            path: Some(p.clone()),
            ..Default::default()
        }
    }

    /// Close every denylist, releasing file watchers. Idempotent; every
    /// list is attempted and the first release error is returned.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for dl in &mut self.denylists {
            if let Err(e) = dl.close() {
                warn!(file = %dl.filename, %e, "error closing denylist");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
