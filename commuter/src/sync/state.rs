//! Connection state machine for the sync bridge.
//!
//! Pure and side-effect free: events go in, a new state and a list of
//! actions come out. The bridge performs the I/O the actions describe.

use serde::Serialize;

/// Connection state with the paired device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Disconnected,
    /// Session activation in progress.
    Connecting,
    /// Session active; pushes and pulls are allowed.
    Ready,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    ConnectRequested,
    Activated,
    ActivationFailed,
    /// The app came to the foreground.
    Foregrounded,
    SendFailed,
    ReceiveFailed,
    TeardownRequested,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Activate,
    SendPullRequest,
}

impl SyncState {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: SyncEvent) -> (Self, Vec<SyncAction>) {
        use SyncEvent::*;

        match (self, event) {
            (Self::Disconnected, ConnectRequested | Foregrounded) => {
                (Self::Connecting, vec![SyncAction::Activate])
            }

            (Self::Connecting, Activated) => (Self::Ready, vec![SyncAction::SendPullRequest]),
            (Self::Connecting, ActivationFailed) => (Self::Disconnected, vec![]),

            (Self::Ready, Foregrounded) => (Self::Ready, vec![SyncAction::SendPullRequest]),
            (Self::Ready, SendFailed | ReceiveFailed | TeardownRequested) => {
                (Self::Disconnected, vec![])
            }

            (state, _) => (state, vec![]),
        }
    }
}
