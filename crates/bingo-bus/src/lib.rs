//! Publish/subscribe between the session engine and the services around it.
//!
//! Two logical channels exist ([`Channel::Game`] and [`Channel::Bot`]).
//! Payloads on the wire are plain JSON text; [`BusCommand`] ties each typed
//! command enum to its channel so callers publish and subscribe with types
//! rather than channel names and strings.
//!
//! ```text
//! admin API ──START/RESET/END_GAME──▶ Channel::Game ──▶ SessionRegistry
//! Session ──ANNOUNCE_BINGO/GAME_ENDED──▶ Channel::Bot ──▶ chat bot
//! ```

mod error;
mod local;
mod typed;

pub use error::BusError;
pub use local::LocalBus;
pub use typed::{BusCommand, TypedSubscription, publish_command};

use std::fmt;
use std::future::Future;

use tokio::sync::broadcast;

/// A named pub/sub channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Instructions to the engine: start, reset, end.
    Game,
    /// Notifications from the engine to the chat bot.
    Bot,
}

impl Channel {
    /// The channel name shared with the other services.
    pub fn name(self) -> &'static str {
        match self {
            Self::Game => "GAME_CHANNEL",
            Self::Bot => "BOT_CHANNEL",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pub/sub transport for raw text payloads.
///
/// Delivery is at-most-once and only to subscribers that exist at publish
/// time, which matches what a Redis-style pub/sub offers.
pub trait CommandBus: Send + Sync + 'static {
    /// Publishes `payload` to everyone subscribed to `channel`.
    fn publish(
        &self,
        channel: Channel,
        payload: String,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Starts receiving everything published to `channel` from now on.
    fn subscribe(
        &self,
        channel: Channel,
    ) -> impl Future<Output = Result<Subscription, BusError>> + Send;
}

/// A stream of raw payloads from one channel.
///
/// Backends feed a `tokio::sync::broadcast` channel; a subscriber that
/// falls behind skips the oldest payloads with a warning instead of
/// blocking publishers.
#[derive(Debug)]
pub struct Subscription {
    channel: Channel,
    receiver: broadcast::Receiver<String>,
}

impl Subscription {
    pub fn new(channel: Channel, receiver: broadcast::Receiver<String>) -> Self {
        Self { channel, receiver }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Waits for the next payload. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        channel = %self.channel,
                        skipped,
                        "subscriber lagged, payloads dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
