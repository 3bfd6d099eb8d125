//! # Audio Module
//!
//! Playback state and the bridge to the Lavalink node.
//!
//! ### [`queue`] - Queue Management
//! - [`queue::QueueRecord`]: pending tracks, current track and loop flag for one guild
//! - [`queue::GuildQueueStore`]: process-wide guild → record map
//!
//! ### [`backend`] - Backend Contract
//! - [`backend::AudioBackend`]: resolve, session and playback operations
//! - Player and node events, node readiness
//!
//! ### [`lavalink_client`] - Lavalink Adapter
//! - `AudioBackend` over lavalink-rs, with songbird handling the voice handshake

pub mod backend;
pub mod lavalink_client;
pub mod queue;
