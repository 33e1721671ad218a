//! `BingoServer` builder and server loop.
//!
//! This is the entry point for running an engine process. It ties together
//! all the layers: transport → gateway → registry → session actors, plus
//! the bus listener and the service heartbeat.

use std::sync::Arc;

use bingo_bus::CommandBus;
use bingo_game::SessionRegistry;
use bingo_protocol::JsonCodec;
use bingo_store::StateStore;
use bingo_transport::{Transport, WebSocketTransport};

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::health::ServiceHeartbeat;
use crate::BingoError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S, B, A> {
    pub(crate) registry: Arc<SessionRegistry<S, B>>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a bingo server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use bingo::prelude::*;
///
/// # async fn run() -> Result<(), BingoError> {
/// let server = BingoServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(Arc::new(MemoryStore::new()), Arc::new(LocalBus::new()), TrustClaims)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BingoServerBuilder {
    config: ServerConfig,
}

impl BingoServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration, bind address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and wires the registry to `store` and `bus`.
    ///
    /// Nothing is accepted until [`BingoServer::run`] is called.
    pub async fn build<S, B, A>(
        self,
        store: Arc<S>,
        bus: Arc<B>,
        auth: A,
    ) -> Result<BingoServer<S, B, A>, BingoError>
    where
        S: StateStore,
        B: CommandBus,
        A: Authenticator,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);

        let registry = Arc::new(SessionRegistry::new(
            store,
            bus,
            self.config.session.clone(),
        ));
        let state = Arc::new(ServerState {
            registry,
            auth,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(BingoServer { transport, state })
    }
}

impl Default for BingoServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound bingo server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BingoServer<S, B, A> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, B, A>>,
}

impl<S, B, A> BingoServer<S, B, A>
where
    S: StateStore,
    B: CommandBus,
    A: Authenticator,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry behind this server. Lets an embedding process start
    /// or end games without going through the bus.
    pub fn registry(&self) -> &Arc<SessionRegistry<S, B>> {
        &self.state.registry
    }

    /// Runs the server until the process is terminated.
    ///
    /// Subscribes to the game-control channel, starts the service
    /// heartbeat, then accepts connections and spawns a handler task for
    /// each.
    pub async fn run(mut self) -> Result<(), BingoError> {
        let _commands = AbortOnDrop(self.state.registry.listen().await?);
        let heartbeat = ServiceHeartbeat::new(
            Arc::clone(self.state.registry.repository().store()),
            self.state.config.service_name.clone(),
            self.state.config.service_heartbeat_interval,
        )
        .spawn();
        let _heartbeat = AbortOnDrop(heartbeat);

        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            service = %self.state.config.service_name,
            "bingo server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Stops a background task when the server future is dropped.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
