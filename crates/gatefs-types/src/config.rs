// Configuration structs for denylist discovery and remote subscriptions.

use std::path::PathBuf;
use std::time::Duration;

/// Default poll interval for remote denylist subscriptions.
pub const DEFAULT_SUBSCRIBE_INTERVAL: Duration = Duration::from_secs(60);

// ── Blocker ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BlockerConfig {
    /// Directories scanned for `.deny` files, highest priority first.
    /// Defaults to `$XDG_CONFIG_HOME/ipfs/denylists` (falling back to
    /// `$HOME/.config/ipfs/denylists`) followed by `/etc/ipfs/denylists`.
    pub denylist_dirs: Vec<PathBuf>,

    /// Keep list files open and ingest appended rules live.
    pub follow: bool,
}

impl Default for BlockerConfig {
    fn default() -> Self {
        let config_home = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .unwrap_or_else(|| PathBuf::from("/etc"));

        Self {
            denylist_dirs: vec![
                config_home.join("ipfs").join("denylists"),
                PathBuf::from("/etc/ipfs/denylists"),
            ],
            follow: true,
        }
    }
}

// ── Subscriptions ─────────────────────────────────────────────────────────────

/// One remote denylist kept in sync with a local file via ranged GETs.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Remote denylist URL.
    pub remote_url: String,

    /// Local file the fetched bytes are appended to.
    pub local_file: PathBuf,

    /// Poll interval between range requests.
    pub interval: Duration,
}

impl SubscriberConfig {
    pub fn new(remote_url: impl Into<String>, local_file: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_file: local_file.into(),
            interval: DEFAULT_SUBSCRIBE_INTERVAL,
        }
    }
}
