//! Session tuning knobs.

use std::time::Duration;

/// Timing and buffering for every session a registry spawns.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player keeps their slot before removal.
    pub disconnect_grace: Duration,

    /// Cooldown announced to a player after a valid bingo claim. The client
    /// enforces it; the server only reports it.
    pub bingo_cooldown: Duration,

    /// Capacity of each session actor's command queue. When full, callers
    /// wait.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnect_grace: Duration::from_secs(30),
            bingo_cooldown: Duration::from_secs(60),
            command_buffer: 64,
        }
    }
}
