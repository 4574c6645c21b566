//! Wire messages exchanged between paired devices.

use serde::{Deserialize, Serialize};

use crate::domain::Favorite;
use crate::store::{ChangeOp, FavoriteChange};

/// A sync protocol message. Transient; never persisted.
///
/// Tagged by `kind`:
///
/// ```
/// use commuter::sync::SyncMessage;
///
/// let json = serde_json::to_string(&SyncMessage::PullRequest).unwrap();
/// assert_eq!(json, r#"{"kind":"pullRequest"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncMessage {
    /// A single local change.
    Push { favorite: Favorite, op: ChangeOp },
    /// Ask the peer for its full list.
    PullRequest,
    /// The sender's full list.
    PullReply { favorites: Vec<Favorite> },
}

impl From<FavoriteChange> for SyncMessage {
    fn from(change: FavoriteChange) -> Self {
        Self::Push {
            favorite: change.favorite,
            op: change.op,
        }
    }
}

impl SyncMessage {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::PullRequest => "pullRequest",
            Self::PullReply { .. } => "pullReply",
        }
    }
}
