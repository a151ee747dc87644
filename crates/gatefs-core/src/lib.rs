pub mod blocker;
pub mod content_id;
pub mod denylist;
pub mod discover;
pub mod store;
pub mod subscription;

pub use blocker::Blocker;
pub use denylist::{Denylist, DenylistHeader};
pub use discover::denylist_files;
pub use store::BlockDb;
pub use subscription::HttpSubscriber;

pub use gatefs_types::{BlockError, ContentPath, Entry, Status, StatusError, StatusResponse};
