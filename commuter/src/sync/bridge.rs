//! Favorites sync between two independently persisted stores.
//!
//! Local changes are pushed in order, without acknowledgement, while the
//! session is ready.
//! Becoming ready (and every foreground transition) pulls the peer's full
//! list and merges it: the peer's list wins, and local favorites the peer
//! has never seen are kept.
//!
//! The merge carries no deletion markers. A favorite removed on one device
//! while the other was unreachable comes back on the next pull from the
//! device that still has it.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::MessageChannel;
use super::message::SyncMessage;
use super::state::{SyncAction, SyncEvent, SyncState};
use crate::domain::{Favorite, FavoriteId};
use crate::store::{FavoriteChange, FavoriteStore};

/// Default time to wait for a `pullReply`.
const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sync bridge configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long to wait for the peer's reply to a pull request before
    /// staying on local state.
    pub pull_timeout: Duration,
}

impl SyncConfig {
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

/// What a pull achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The merged list replaced the local store.
    Merged { count: usize },
    /// The merge produced the list we already had.
    Unchanged,
    /// No reply within the timeout; local state kept.
    TimedOut,
    /// The peer answered without a `pullReply`.
    NoReply,
    /// The request could not be sent.
    Failed,
    /// Not connected.
    NotReady,
}

/// Connects a [`FavoriteStore`] to its peer over a [`MessageChannel`].
pub struct SyncBridge {
    store: Arc<FavoriteStore>,
    channel: Arc<dyn MessageChannel>,
    state: Mutex<SyncState>,
    config: SyncConfig,
}

impl SyncBridge {
    pub fn new(
        store: Arc<FavoriteStore>,
        channel: Arc<dyn MessageChannel>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            channel,
            state: Mutex::new(SyncState::default()),
            config,
        }
    }

    pub fn state(&self) -> SyncState {
        *self.lock_state()
    }

    /// Activate the session and, once ready, pull.
    pub async fn connect(&self) {
        let actions = self.dispatch(SyncEvent::ConnectRequested);
        self.run_actions(actions).await;
    }

    /// App came to the foreground: connect if needed, otherwise pull.
    pub async fn on_foreground(&self) {
        let actions = self.dispatch(SyncEvent::Foregrounded);
        self.run_actions(actions).await;
    }

    pub fn teardown(&self) {
        self.dispatch(SyncEvent::TeardownRequested);
    }

    /// An inbound message could not be read.
    pub fn receive_failed(&self) {
        self.dispatch(SyncEvent::ReceiveFailed);
    }

    /// Handle a message from the peer, returning the reply to send back.
    ///
    /// Inbound messages are applied whatever the local connection state;
    /// their arrival is proof the peer can reach us.
    pub fn receive(&self, message: SyncMessage) -> Option<SyncMessage> {
        debug!(kind = message.kind(), "received sync message");
        match message {
            SyncMessage::Push { favorite, op } => {
                let id = favorite.id();
                match self.store.apply_remote(FavoriteChange { favorite, op }) {
                    Ok(changed) => debug!(%id, ?op, changed, "applied pushed change"),
                    Err(e) => warn!(%id, error = %e, "pushed change applied but not saved"),
                }
                None
            }
            SyncMessage::PullRequest => Some(SyncMessage::PullReply {
                favorites: self.store.all().to_vec(),
            }),
            SyncMessage::PullReply { favorites } => {
                self.merge(favorites);
                None
            }
        }
    }

    /// Pull the peer's list and merge it, if ready.
    pub async fn request_pull(&self) -> PullOutcome {
        if !self.state().is_ready() {
            return PullOutcome::NotReady;
        }
        self.pull().await
    }

    /// Push a local change to the peer without waiting for it.
    ///
    /// Dropped (not queued) when the session is not ready or the peer is not
    /// reachable. A failed send disconnects the session. Separate calls are
    /// not ordered against each other; [`SyncBridge::run`] is.
    pub fn push(self: &Arc<Self>, change: FavoriteChange) -> Option<JoinHandle<()>> {
        if !self.can_push(&change) {
            return None;
        }
        let bridge = Arc::clone(self);
        Some(tokio::spawn(async move { bridge.send_change(change).await }))
    }

    /// Push every local change, in order, until the store's change queue
    /// closes.
    ///
    /// Each send completes before the next change is taken, so the peer
    /// applies an add and a later remove of the same favorite in that order.
    pub async fn run(self: Arc<Self>, mut changes: mpsc::UnboundedReceiver<FavoriteChange>) {
        while let Some(change) = changes.recv().await {
            if self.can_push(&change) {
                self.send_change(change).await;
            }
        }
        debug!("favorite change queue closed, sync loop exiting");
    }

    fn can_push(&self, change: &FavoriteChange) -> bool {
        let id = change.favorite.id();
        if !self.state().is_ready() {
            debug!(%id, "not connected, dropping change");
            return false;
        }
        if !self.channel.is_reachable() {
            debug!(%id, "peer not reachable, dropping change");
            return false;
        }
        true
    }

    async fn send_change(&self, change: FavoriteChange) {
        let id = change.favorite.id();
        if let Err(e) = self.channel.send(SyncMessage::from(change)).await {
            warn!(%id, error = %e, "push failed, dropping change");
            self.dispatch(SyncEvent::SendFailed);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: SyncEvent) -> Vec<SyncAction> {
        let mut state = self.lock_state();
        let current = *state;
        let (next, actions) = current.on_event(event);
        if next != current {
            info!(from = ?current, to = ?next, ?event, "sync state changed");
        }
        *state = next;
        actions
    }

    async fn run_actions(&self, actions: Vec<SyncAction>) {
        let mut pending = VecDeque::from(actions);
        while let Some(action) = pending.pop_front() {
            match action {
                SyncAction::Activate => {
                    let event = match self.channel.activate().await {
                        Ok(()) => SyncEvent::Activated,
                        Err(e) => {
                            warn!(error = %e, "sync session activation failed");
                            SyncEvent::ActivationFailed
                        }
                    };
                    pending.extend(self.dispatch(event));
                }
                SyncAction::SendPullRequest => {
                    self.pull().await;
                }
            }
        }
    }

    async fn pull(&self) -> PullOutcome {
        let request = self.channel.send(SyncMessage::PullRequest);
        match tokio::time::timeout(self.config.pull_timeout, request).await {
            Err(_) => {
                warn!(
                    timeout_secs = self.config.pull_timeout.as_secs(),
                    "pull timed out, keeping local favorites"
                );
                PullOutcome::TimedOut
            }
            Ok(Err(e)) => {
                warn!(error = %e, "pull request failed");
                self.dispatch(SyncEvent::SendFailed);
                PullOutcome::Failed
            }
            Ok(Ok(Some(SyncMessage::PullReply { favorites }))) => self.merge(favorites),
            Ok(Ok(other)) => {
                debug!(reply = ?other.as_ref().map(SyncMessage::kind), "pull got no list");
                PullOutcome::NoReply
            }
        }
    }

    fn merge(&self, remote: Vec<Favorite>) -> PullOutcome {
        let count = match self.store.replace_with(|local| merge_favorites(remote, local)) {
            Ok(Some(count)) => count,
            Ok(None) => {
                debug!("merge left favorites unchanged");
                return PullOutcome::Unchanged;
            }
            Err(e) => {
                warn!(error = %e, "merged favorites applied but not saved");
                self.store.all().len()
            }
        };
        info!(count, "merged favorites from peer");
        PullOutcome::Merged { count }
    }
}

/// Merge a peer's full list into the local one.
///
/// The remote list is authoritative and keeps its order; local favorites
/// whose id the remote has never seen are appended.
pub fn merge_favorites(remote: Vec<Favorite>, local: &[Favorite]) -> Vec<Favorite> {
    let remote_ids: HashSet<FavoriteId> = remote.iter().map(Favorite::id).collect();
    let mut merged = remote;
    merged.extend(
        local
            .iter()
            .filter(|f| !remote_ids.contains(&f.id()))
            .cloned(),
    );
    merged
}
