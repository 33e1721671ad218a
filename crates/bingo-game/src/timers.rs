//! Per-player disconnect grace timers.
//!
//! A timer is a sleeping task that, when it wakes, posts
//! [`SessionCommand::GraceExpired`] back into the owning session's queue.
//! The session then asks [`DisconnectTimers::take_if_current`] whether that
//! expiry still counts: each schedule bumps a generation number, so an
//! expiry from a cancelled or replaced timer that was already in flight is
//! recognized as stale and dropped.

use std::collections::HashMap;
use std::time::Duration;

use bingo_protocol::{GameId, PlayerId};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::session::SessionCommand;

/// What a session reports once a grace period ran out and the player was
/// removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryOutcome {
    pub game_id: GameId,
    pub player_id: PlayerId,
    /// `true` if no connections remain in the session.
    pub game_empty: bool,
}

/// Callback run inside the session after an expired player is removed.
///
/// It runs on the session task, so it must not wait on that same session;
/// spawn instead.
pub type OnExpire = Box<dyn FnOnce(ExpiryOutcome) + Send + Sync>;

struct PendingRemoval {
    generation: u64,
    task: AbortHandle,
    on_expire: OnExpire,
}

/// At most one outstanding timer per player; scheduling again replaces it.
#[derive(Default)]
pub(crate) struct DisconnectTimers {
    next_generation: u64,
    pending: HashMap<PlayerId, PendingRemoval>,
}

impl DisconnectTimers {
    pub(crate) fn schedule(
        &mut self,
        player_id: PlayerId,
        grace: Duration,
        on_expire: OnExpire,
        notify: mpsc::WeakSender<SessionCommand>,
    ) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;

        let expired = player_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(session) = notify.upgrade() {
                let _ = session
                    .send(SessionCommand::GraceExpired {
                        player_id: expired,
                        generation,
                    })
                    .await;
            }
        })
        .abort_handle();

        let replaced = self.pending.insert(
            player_id.clone(),
            PendingRemoval {
                generation,
                task,
                on_expire,
            },
        );
        if let Some(previous) = replaced {
            previous.task.abort();
            tracing::debug!(%player_id, "replaced pending disconnect timer");
        }
        generation
    }

    /// Cancels the player's timer. Returns `true` if one was pending.
    pub(crate) fn cancel(&mut self, player_id: &PlayerId) -> bool {
        match self.pending.remove(player_id) {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    /// Claims the callback for an expiry, if `generation` is still the
    /// player's live timer.
    pub(crate) fn take_if_current(
        &mut self,
        player_id: &PlayerId,
        generation: u64,
    ) -> Option<OnExpire> {
        let current = self
            .pending
            .get(player_id)
            .is_some_and(|pending| pending.generation == generation);
        if !current {
            return None;
        }
        self.pending.remove(player_id).map(|pending| pending.on_expire)
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, player_id: &PlayerId) -> bool {
        self.pending.contains_key(player_id)
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
    }
}

impl Drop for DisconnectTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> OnExpire {
        Box::new(|_| {})
    }

    async fn next_expiry(
        rx: &mut mpsc::Receiver<SessionCommand>,
        within: Duration,
    ) -> Option<(PlayerId, u64)> {
        match tokio::time::timeout(within, rx.recv()).await {
            Ok(Some(SessionCommand::GraceExpired {
                player_id,
                generation,
            })) => Some((player_id, generation)),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_after_grace() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = DisconnectTimers::default();
        let alice = PlayerId::new("alice");

        let generation =
            timers.schedule(alice.clone(), Duration::from_secs(30), noop(), tx.downgrade());

        assert!(next_expiry(&mut rx, Duration::from_secs(29)).await.is_none());
        let fired = next_expiry(&mut rx, Duration::from_secs(2)).await;
        assert_eq!(fired, Some((alice.clone(), generation)));
        assert!(timers.take_if_current(&alice, generation).is_some());
        assert!(!timers.is_pending(&alice));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_expiry() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = DisconnectTimers::default();
        let alice = PlayerId::new("alice");

        timers.schedule(alice.clone(), Duration::from_secs(30), noop(), tx.downgrade());
        assert!(timers.cancel(&alice));
        assert!(!timers.cancel(&alice));

        assert!(next_expiry(&mut rx, Duration::from_secs(60)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_makes_earlier_generation_stale() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = DisconnectTimers::default();
        let alice = PlayerId::new("alice");

        let first =
            timers.schedule(alice.clone(), Duration::from_secs(30), noop(), tx.downgrade());
        let second =
            timers.schedule(alice.clone(), Duration::from_secs(30), noop(), tx.downgrade());
        assert_ne!(first, second);

        assert!(timers.take_if_current(&alice, first).is_none());
        assert!(timers.is_pending(&alice));

        let fired = next_expiry(&mut rx, Duration::from_secs(31)).await;
        assert_eq!(fired, Some((alice, second)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_session_queue_silences_timer() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = DisconnectTimers::default();
        timers.schedule(PlayerId::new("a"), Duration::from_secs(1), noop(), tx.downgrade());
        drop(tx);

        assert!(next_expiry(&mut rx, Duration::from_secs(5)).await.is_none());
    }
}
