//! Authentication hook for connections.
//!
//! The engine doesn't verify identities itself. By the time a viewer opens
//! a socket, the web app has already logged them in and hands the client a
//! `{gameId, userId, username}` triple to send in `AUTH`. The
//! [`Authenticator`] trait is where a deployment checks those claims (a
//! signed token, a lookup against the user service) or rewrites them.
//!
//! [`TrustClaims`] accepts whatever the client says and is what the bundled
//! binary uses.

use std::future::Future;

use bingo_game::PlayerIdentity;
use bingo_protocol::AuthPayload;

/// Errors an [`Authenticator`] can return.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The claims were understood but refused.
    #[error("authentication failed: {0}")]
    Rejected(String),

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Turns the claims in an `AUTH` message into the identity the session
/// will use.
///
/// - `Send + Sync`: one authenticator is shared by every connection task.
/// - `'static`: it lives as long as the server.
///
/// # Example
///
/// ```rust
/// use bingo::{AuthError, Authenticator, PlayerIdentity};
/// use bingo_protocol::AuthPayload;
///
/// /// Refuses anonymous viewers.
/// struct NoGuests;
///
/// impl Authenticator for NoGuests {
///     async fn authenticate(
///         &self,
///         claims: &AuthPayload,
///     ) -> Result<PlayerIdentity, AuthError> {
///         if claims.username.starts_with("guest") {
///             return Err(AuthError::Rejected("guests can't play".into()));
///         }
///         Ok(PlayerIdentity {
///             player_id: claims.user_id.clone(),
///             username: claims.username.clone(),
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `claims` and returns who the connection belongs to.
    ///
    /// Called once per connection, after the payload passed the protocol
    /// checks (non-empty user id and username).
    fn authenticate(
        &self,
        claims: &AuthPayload,
    ) -> impl Future<Output = Result<PlayerIdentity, AuthError>> + Send;
}

/// Accepts the client's claims as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustClaims;

impl Authenticator for TrustClaims {
    async fn authenticate(
        &self,
        claims: &AuthPayload,
    ) -> Result<PlayerIdentity, AuthError> {
        Ok(PlayerIdentity {
            player_id: claims.user_id.clone(),
            username: claims.username.clone(),
        })
    }
}
