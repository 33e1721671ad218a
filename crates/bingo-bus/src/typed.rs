//! Typed publish/subscribe over a [`CommandBus`].

use std::marker::PhantomData;

use bingo_protocol::{BotCommand, Codec, GameCommand, JsonCodec};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{BusError, Channel, CommandBus, Subscription};

/// A command enum that travels on a fixed channel.
pub trait BusCommand: Serialize + DeserializeOwned + Send + 'static {
    const CHANNEL: Channel;
}

impl BusCommand for GameCommand {
    const CHANNEL: Channel = Channel::Game;
}

impl BusCommand for BotCommand {
    const CHANNEL: Channel = Channel::Bot;
}

/// Encodes `command` and publishes it on its channel.
pub async fn publish_command<B, C>(bus: &B, command: &C) -> Result<(), BusError>
where
    B: CommandBus + ?Sized,
    C: BusCommand + Sync,
{
    let payload = JsonCodec.encode(command)?;
    bus.publish(C::CHANNEL, payload).await
}

/// A [`Subscription`] that decodes each payload as `C`.
#[derive(Debug)]
pub struct TypedSubscription<C> {
    inner: Subscription,
    _command: PhantomData<fn() -> C>,
}

impl<C: BusCommand> TypedSubscription<C> {
    /// Subscribes to `C`'s channel.
    pub async fn subscribe<B: CommandBus + ?Sized>(
        bus: &B,
    ) -> Result<Self, BusError> {
        let inner = bus.subscribe(C::CHANNEL).await?;
        Ok(Self {
            inner,
            _command: PhantomData,
        })
    }

    /// Waits for the next payload and decodes it.
    ///
    /// Returns `None` when the bus is gone. A payload that isn't a valid
    /// `C` comes back as `Some(Err(..))` so the caller can log it and keep
    /// reading.
    pub async fn recv(&mut self) -> Option<Result<C, BusError>> {
        let payload = self.inner.recv().await?;
        Some(JsonCodec.decode(payload.as_bytes()).map_err(BusError::from))
    }
}

#[cfg(test)]
mod tests {
    use bingo_protocol::GameId;

    use super::*;
    use crate::LocalBus;

    #[tokio::test]
    async fn test_publish_command_round_trips_through_channel() {
        let bus = LocalBus::new();
        let mut sub = TypedSubscription::<GameCommand>::subscribe(&bus)
            .await
            .unwrap();

        let game_id = GameId::new();
        publish_command(&bus, &GameCommand::ResetGame { game_id })
            .await
            .unwrap();

        let received = sub.recv().await.unwrap().unwrap();
        assert_eq!(received, GameCommand::ResetGame { game_id });
    }

    #[tokio::test]
    async fn test_bot_command_goes_to_bot_channel() {
        let bus = LocalBus::new();
        let mut raw = bus.subscribe(Channel::Bot).await.unwrap();

        publish_command(&bus, &BotCommand::GameEnded { game_id: GameId::new() })
            .await
            .unwrap();

        let payload = raw.recv().await.unwrap();
        assert!(payload.contains("\"command\":\"GAME_ENDED\""));
    }

    #[tokio::test]
    async fn test_recv_malformed_payload_is_error_and_stream_continues() {
        let bus = LocalBus::new();
        let mut sub = TypedSubscription::<GameCommand>::subscribe(&bus)
            .await
            .unwrap();

        bus.publish(Channel::Game, "{not json".into()).await.unwrap();
        let game_id = GameId::new();
        publish_command(&bus, &GameCommand::EndGame { game_id })
            .await
            .unwrap();

        assert!(matches!(sub.recv().await, Some(Err(BusError::Codec(_)))));
        assert_eq!(
            sub.recv().await.unwrap().unwrap(),
            GameCommand::EndGame { game_id }
        );
    }
}
