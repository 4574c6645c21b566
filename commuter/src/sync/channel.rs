//! Message channels to the paired device.
//!
//! The channel is unreliable: the peer may be unreachable at any time and
//! nothing is queued or retried. A send resolves to the peer's reply, if it
//! sent one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::bridge::SyncBridge;
use super::message::SyncMessage;

/// Default request timeout for the HTTP channel.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The peer cannot be reached right now.
    #[error("peer unreachable")]
    Unreachable,

    /// Session activation failed.
    #[error("activation failed: {0}")]
    ActivationFailed(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The peer answered with an error status.
    #[error("peer returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The channel has been closed.
    #[error("channel closed")]
    Closed,
}

/// A bidirectional session with the paired device.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Activate the session.
    async fn activate(&self) -> Result<(), ChannelError>;

    /// Send a message and wait for the peer's reply, if any.
    async fn send(&self, message: SyncMessage) -> Result<Option<SyncMessage>, ChannelError>;

    /// Whether the peer is believed reachable right now.
    fn is_reachable(&self) -> bool;
}

/// Configuration for [`HttpPeerChannel`].
#[derive(Debug, Clone)]
pub struct HttpPeerConfig {
    /// Base URL of the peer, e.g. `http://192.168.1.20:3000`.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpPeerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Peer reached over HTTP.
///
/// Activation probes the peer's `/health`; messages are POSTed as JSON to
/// `/api/sync` and the response body is the peer's reply (`null` for none).
#[derive(Debug, Clone)]
pub struct HttpPeerChannel {
    http: reqwest::Client,
    base_url: String,
    reachable: Arc<AtomicBool>,
}

impl HttpPeerChannel {
    pub fn new(config: HttpPeerConfig) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            reachable: Arc::new(AtomicBool::new(false)),
        })
    }

    fn mark(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }
}

#[async_trait]
impl MessageChannel for HttpPeerChannel {
    async fn activate(&self) -> Result<(), ChannelError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).send().await.map_err(|e| {
            self.mark(false);
            ChannelError::ActivationFailed(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            self.mark(false);
            return Err(ChannelError::ActivationFailed(format!("health check returned {status}")));
        }

        self.mark(true);
        Ok(())
    }

    async fn send(&self, message: SyncMessage) -> Result<Option<SyncMessage>, ChannelError> {
        let url = format!("{}/api/sync", self.base_url);
        let response = match self.http.post(&url).json(&message).send().await {
            Ok(response) => response,
            Err(e) => {
                self.mark(false);
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let reply: Option<SyncMessage> = response.json().await?;
        debug!(kind = message.kind(), replied = reply.is_some(), "sent sync message");
        Ok(reply)
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }
}

/// A message in flight between two [`MemoryChannel`]s.
#[derive(Debug)]
pub struct Envelope {
    pub message: SyncMessage,
    pub reply: oneshot::Sender<Option<SyncMessage>>,
}

/// Receiving end of a [`MemoryChannel`].
#[derive(Debug)]
pub struct MemoryInbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl MemoryInbox {
    /// Take the next envelope, `None` once the sending channel is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Deliver every inbound message to `bridge` and send back its reply.
    pub fn serve(mut self, bridge: Arc<SyncBridge>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = self.recv().await {
                let answer = bridge.receive(message);
                let _ = reply.send(answer);
            }
        })
    }
}

#[derive(Debug, Default)]
struct MemoryChannelInner {
    reachable: bool,
    sent: Vec<SyncMessage>,
    activations: usize,
    fail_next_activate: Option<String>,
    fail_next_send: Option<String>,
}

/// In-process channel for tests and single-process pairs.
///
/// Clones share state, so a test can flip reachability or inject failures
/// after handing a clone to a bridge.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    inner: Arc<Mutex<MemoryChannelInner>>,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl MemoryChannel {
    /// A channel whose sends land in the returned inbox.
    pub fn with_inbox() -> (Self, MemoryInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            inner: Arc::new(Mutex::new(MemoryChannelInner {
                reachable: true,
                ..Default::default()
            })),
            outbox: tx,
        };
        (channel, MemoryInbox { rx })
    }

    /// Two connected channels. Each inbox receives what the *other* side sends.
    pub fn pair() -> ((Self, MemoryInbox), (Self, MemoryInbox)) {
        let (a, sent_by_a) = Self::with_inbox();
        let (b, sent_by_b) = Self::with_inbox();
        ((a, sent_by_b), (b, sent_by_a))
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Cause the next `activate()` to fail.
    pub fn fail_next_activate(&self, error: &str) {
        self.lock().fail_next_activate = Some(error.to_string());
    }

    /// Cause the next `send()` to fail.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Every message sent so far.
    pub fn sent(&self) -> Vec<SyncMessage> {
        self.lock().sent.clone()
    }

    pub fn activations(&self) -> usize {
        self.lock().activations
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn activate(&self) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_activate.take() {
            return Err(ChannelError::ActivationFailed(error));
        }
        if !inner.reachable {
            return Err(ChannelError::Unreachable);
        }
        inner.activations += 1;
        Ok(())
    }

    async fn send(&self, message: SyncMessage) -> Result<Option<SyncMessage>, ChannelError> {
        {
            let mut inner = self.lock();
            if !inner.reachable {
                return Err(ChannelError::Unreachable);
            }
            if let Some(error) = inner.fail_next_send.take() {
                return Err(ChannelError::SendFailed(error));
            }
            inner.sent.push(message.clone());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.outbox
            .send(Envelope {
                message,
                reply: reply_tx,
            })
            .map_err(|_| ChannelError::Closed)?;

        reply_rx.await.map_err(|_| ChannelError::Closed)
    }

    fn is_reachable(&self) -> bool {
        self.lock().reachable
    }
}
