//! Favorites synchronization with a paired device.
//!
//! [`SyncBridge`] drives a pure connection state machine ([`SyncState`])
//! over a [`MessageChannel`]. Local store changes are pushed as they
//! happen; full lists are pulled and merged whenever the session becomes
//! ready.

mod bridge;
mod channel;
mod message;
mod state;

pub use bridge::{PullOutcome, SyncBridge, SyncConfig, merge_favorites};
pub use channel::{
    ChannelError, Envelope, HttpPeerChannel, HttpPeerConfig, MemoryChannel, MemoryInbox,
    MessageChannel,
};
pub use message::SyncMessage;
pub use state::{SyncAction, SyncEvent, SyncState};
