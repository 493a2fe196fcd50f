//! Client-side analytics gateways.
//!
//! A [`Tracker`] pairs one [`Gateway`] (Meta Pixel or GA4) with a one-time
//! [`InitGate`], an [`EventDeduplicator`](vfx_dedup::EventDeduplicator) and an
//! optional [`ServerMirror`] that replays each event through the server relay.

pub mod error;
pub mod gate;
pub mod gateway;
pub mod mirror;
pub mod tracker;

pub use error::{Result, TrackingError};
pub use gate::{InitGate, InitState};
pub use gateway::{Command, CommandSink, Ga4Gateway, Gateway, MetaPixel, RecordingSink, TracingSink};
pub use mirror::{HttpMirror, MirrorRequest, MockMirror, ServerMirror};
pub use tracker::{SessionContext, TrackOutcome, TrackedEvent, Tracker};
