use tokio::sync::broadcast;

use crate::{BusError, Channel, CommandBus, Subscription};

/// Per-channel buffer. A subscriber further behind than this starts
/// skipping payloads.
const CHANNEL_CAPACITY: usize = 256;

/// An in-process [`CommandBus`] with one broadcast channel per [`Channel`].
///
/// Cloning is cheap and every clone publishes to the same subscribers, so a
/// test can hold one clone as "the admin API" while the registry holds
/// another.
#[derive(Debug, Clone)]
pub struct LocalBus {
    game: broadcast::Sender<String>,
    bot: broadcast::Sender<String>,
}

impl LocalBus {
    pub fn new() -> Self {
        let (game, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (bot, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { game, bot }
    }

    fn sender(&self, channel: Channel) -> &broadcast::Sender<String> {
        match channel {
            Channel::Game => &self.game,
            Channel::Bot => &self.bot,
        }
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.sender(channel).receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus for LocalBus {
    async fn publish(
        &self,
        channel: Channel,
        payload: String,
    ) -> Result<(), BusError> {
        // Err here only means nobody is subscribed; pub/sub drops it too.
        if self.sender(channel).send(payload).is_err() {
            tracing::debug!(%channel, "published with no subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self, channel: Channel) -> Result<Subscription, BusError> {
        Ok(Subscription::new(channel, self.sender(channel).subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_on_channel() {
        let bus = LocalBus::new();
        let mut first = bus.subscribe(Channel::Game).await.unwrap();
        let mut second = bus.subscribe(Channel::Game).await.unwrap();
        let mut other = bus.subscribe(Channel::Bot).await.unwrap();

        bus.publish(Channel::Game, "hello".into()).await.unwrap();

        assert_eq!(first.recv().await.as_deref(), Some("hello"));
        assert_eq!(second.recv().await.as_deref(), Some("hello"));
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = LocalBus::new();
        assert!(bus.publish(Channel::Bot, "x".into()).await.is_ok());
        assert_eq!(bus.subscriber_count(Channel::Bot), 0);
    }

    #[tokio::test]
    async fn test_recv_skips_lagged_payloads() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe(Channel::Game).await.unwrap();
        for i in 0..CHANNEL_CAPACITY + 10 {
            bus.publish(Channel::Game, i.to_string()).await.unwrap();
        }
        // The first ten were overwritten.
        assert_eq!(sub.recv().await.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe(Channel::Game).await.unwrap();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::Game.to_string(), "GAME_CHANNEL");
        assert_eq!(Channel::Bot.to_string(), "BOT_CHANNEL");
    }
}
