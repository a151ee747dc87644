//! Query verdicts.

use std::fmt;

use cid::Cid;

use crate::entry::Entry;
use crate::error::BlockError;
use crate::path::ContentPath;

// ── Status ────────────────────────────────────────────────────────────────────

/// Whether an item is blocked, explicitly allowed, or simply not present in
/// a denylist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    NotFound,
    Blocked,
    Allowed,
    Errored,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::NotFound => "not found",
            Status::Blocked => "blocked",
            Status::Allowed => "allowed",
            Status::Errored => "errored",
        };
        f.write_str(s)
    }
}

// ── StatusResponse ────────────────────────────────────────────────────────────

/// Full answer to a blocking query: the verdict, the queried item, and the
/// denylist file and rule that produced it when one matched.
#[derive(Debug, Default)]
pub struct StatusResponse {
    pub cid: Option<Cid>,
    pub path: Option<ContentPath>,
    pub status: Status,
    pub filename: String,
    pub entry: Option<Entry>,
    pub error: Option<BlockError>,
}

impl StatusResponse {
    /// Convert into a failure signal. `None` for [`Status::NotFound`] and
    /// [`Status::Allowed`]; [`Status::Blocked`] and [`Status::Errored`]
    /// produce a [`StatusError`].
    pub fn into_error(self) -> Option<StatusError> {
        match self.status {
            Status::Blocked | Status::Errored => Some(StatusError { response: self }),
            Status::NotFound | Status::Allowed => None,
        }
    }
}

// ── StatusError ───────────────────────────────────────────────────────────────

/// Error form of a blocked or errored response, for host adapters that
/// propagate blocking as a failed operation.
#[derive(Debug)]
pub struct StatusError {
    pub response: StatusResponse,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.response.error {
            return write!(f, "{err}");
        }
        if let Some(c) = &self.response.cid {
            return write!(f, "{c} is blocked and cannot be provided");
        }
        let path = self.response.path.as_ref().map(|p| p.as_str()).unwrap_or("");
        write!(f, "{path} is blocked and cannot be provided")
    }
}

impl std::error::Error for StatusError {}

// ── Tests ─────────────────────────────────────────────────────────────────────
