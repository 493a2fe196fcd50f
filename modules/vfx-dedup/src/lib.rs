//! Deduplication of analytics events.
//!
//! An [`EventDeduplicator`] remembers which `(event_name, identifier)` pairs
//! were sent recently and for how long they suppress a resend. Records live
//! in any [`KeyValueStore`]; the in-process [`MemoryStore`] and the on-disk
//! [`FileStore`] ship with the crate.

pub mod clock;
pub mod dedup;
pub mod error;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dedup::{EventDeduplicator, DEFAULT_STORAGE_KEY};
pub use error::{Result, StoreError};
pub use store::{FileStore, KeyValueStore, MemoryStore};
