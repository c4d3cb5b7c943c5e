//! Event routing: from platform adapters to dispatched actions.
//!
//! This crate provides:
//! - The [`PlatformAdapter`] subscribe-by-name contract and an in-process
//!   [`ChannelAdapter`]
//! - Event-name classification and per-platform payload normalization
//! - JSON-lines intake for feeding adapters from a stream
//! - [`EventRouter`], which runs middleware, rule evaluation, action
//!   resolution and dispatch for every canonical event

pub mod adapter;
pub mod error;
pub mod intake;
pub mod normalize;
pub mod router;

pub use adapter::{ChannelAdapter, PlatformAdapter, TIKTOK_EVENTS, TWITCH_EVENTS};
pub use error::RouterError;
pub use normalize::{classify, normalize};
pub use router::{EventRouter, RunOutcome, RunReport};
