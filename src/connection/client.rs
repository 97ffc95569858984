//! Connection representation
//!
//! A `Connection` is owned by the transport task that created it; hubs only
//! keep `Arc` references for membership. Delivery never blocks: messages go
//! through a bounded channel with `try_send`, and a full or closed channel is
//! reported as a write failure.
//!
//! Lifecycle: `Connecting -> Open -> Closing -> Closed`. Only one caller can
//! win the move into `Closing`; that caller owns the teardown.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::hub::Message;
use crate::utils::DeliveryError;

pub type ConnectionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for the connection.
    pub id: ConnectionId,

    /// When the transport handed this connection to a hub.
    pub connected_at: DateTime<Utc>,

    sender: mpsc::Sender<WsMessage>,
    state: AtomicU8,
    closed: CancellationToken,
    dropped: AtomicU64,
}

impl Connection {
    /// Create a connection and the receiving end its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn new(sender: mpsc::Sender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
            sender,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            closed: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True until teardown has started.
    pub fn is_open(&self) -> bool {
        self.state() <= ConnectionState::Open
    }

    /// Queue a message without waiting. Fails when the buffer is full or the
    /// connection is shutting down.
    pub fn try_deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }
        self.sender.try_send(message.to_frame()).map_err(|e| {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                TrySendError::Full(_) => DeliveryError::Full,
                TrySendError::Closed(_) => DeliveryError::Closed,
            }
        })
    }

    /// Messages that could not be queued for this connection.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Token cancelled once the transport must shut down.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move into `Closing`. Returns `true` for exactly one caller.
    pub(crate) fn begin_close(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < ConnectionState::Closing as u8)
                    .then_some(ConnectionState::Closing as u8)
            })
            .is_ok()
    }

    pub(crate) fn finish_close(&self) {
        self.closed.cancel();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}
