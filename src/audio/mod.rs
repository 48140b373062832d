//! # Audio Module
//!
//! Per-guild playback sessions and the voice backend they drive.
//!
//! ## Architecture
//!
//! ### [`session`] - Session State Machine
//! - Idle, Joining, Playing and Paused with loop/repeat policies
//! - Generation counter so late track-end events are ignored
//!
//! ### [`queue`] - Queue Management
//! - FIFO of pending tracks with in-place shuffle
//! - Paged snapshots for the queue view
//!
//! ### [`occupancy`] - Presence Policy
//! - Auto-pause when the channel empties, auto-resume when someone returns
//! - Delayed auto-leave through an [`idle::IdleTimer`]
//!
//! ### [`player`] - Songbird Backend
//! - Voice connections and track handles behind the [`sink::AudioSink`] trait
//!
//! Sessions live in a [`registry::SessionRegistry`] owned by the dispatcher
//! task; nothing in this module is shared between threads except sinks.

pub mod idle;
pub mod occupancy;
pub mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;
pub mod track;
