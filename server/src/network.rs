use crate::session::{GameMessage, Session};
use crate::status::ServerStatus;
use log::{debug, error, info};
use shared::{MAX_DATAGRAM_SIZE, RECV_TIMEOUT_MS, SERVER_PORT, TICK_MS};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Notify};
use tokio::time::{timeout, Instant};

/// Runtime settings for [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Wall-clock time between simulation steps, also used as the step size
    pub tick_duration: Duration,
    /// Upper bound on how long one receive may block the tick check
    pub recv_timeout: Duration,
    /// Fixed seed for obstacle selection, random when None
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", SERVER_PORT),
            tick_duration: Duration::from_millis(TICK_MS),
            recv_timeout: Duration::from_millis(RECV_TIMEOUT_MS),
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("socket receive failed: {0}")]
    Receive(#[source] io::Error),
}

/// Stops a running [`Server`] from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Requests shutdown. The request is kept if the loop is not waiting yet.
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// What woke up the server loop
enum LoopEvent {
    Datagram { len: usize, addr: SocketAddr },
    ReceiveError(io::Error),
    Idle,
    Shutdown,
}

/// Single-task UDP server running the lobby and the match
pub struct Server {
    socket: UdpSocket,
    session: Session,
    config: ServerConfig,
    status_tx: watch::Sender<ServerStatus>,
    shutdown: Arc<Notify>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;

        let session = match config.seed {
            Some(seed) => {
                info!("Using obstacle seed {}", seed);
                Session::seeded(seed)
            }
            None => Session::new(),
        };

        let (status_tx, _) = watch::channel(session.status());
        info!(
            "Server listening on {}",
            socket.local_addr().map_or(config.bind_addr.clone(), |a| a.to_string())
        );

        Ok(Server {
            socket,
            session,
            config,
            status_tx,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Subscribes to the status published after every datagram and tick
    pub fn status(&self) -> watch::Receiver<ServerStatus> {
        self.status_tx.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.shutdown),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Main server loop
    ///
    /// Alternates between receiving one datagram (bounded by the receive
    /// timeout) and running a simulation step whenever a tick period has
    /// elapsed. Returns Ok once shutdown is requested.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let tick_duration = self.config.tick_duration;
        let dt = tick_duration.as_secs_f32();
        let mut last_tick = Instant::now();

        info!("Server started, waiting for players");

        loop {
            let event = tokio::select! {
                _ = self.shutdown.notified() => LoopEvent::Shutdown,
                received = timeout(self.config.recv_timeout, self.socket.recv_from(&mut buffer)) => {
                    match received {
                        Ok(Ok((len, addr))) => LoopEvent::Datagram { len, addr },
                        Ok(Err(e)) => LoopEvent::ReceiveError(e),
                        Err(_) => LoopEvent::Idle,
                    }
                }
            };

            match event {
                LoopEvent::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
                LoopEvent::Datagram { len, addr } => {
                    if let Some(message) = self.session.handle_datagram(&buffer[..len], addr) {
                        self.dispatch(message).await;
                    }
                    self.status_tx.send_replace(self.session.status());
                }
                LoopEvent::ReceiveError(e) if is_transient(&e) => {
                    debug!("Ignoring transient receive error: {}", e);
                }
                LoopEvent::ReceiveError(e) => {
                    error!("Error receiving datagram: {}", e);
                    return Err(ServerError::Receive(e));
                }
                LoopEvent::Idle => {}
            }

            if !self.session.is_started() {
                last_tick = Instant::now();
                continue;
            }

            if last_tick.elapsed() >= tick_duration {
                last_tick = Instant::now();

                if let Some(message) = self.session.tick(dt) {
                    self.dispatch(message).await;
                }
                self.status_tx.send_replace(self.session.status());

                // Periodic monitoring
                let tick = self.session.tick_count();
                if tick > 0 && tick % 60 == 0 {
                    let sim = self.session.simulation();
                    debug!(
                        "Tick {}: {} clients, speed {:.1}, {} obstacles",
                        tick,
                        self.session.clients().len(),
                        sim.velocity(),
                        sim.obstacles().len()
                    );
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&self, message: GameMessage) {
        match message {
            GameMessage::SendPacket { packet, addr } => {
                let text = packet.encode();
                if let Err(e) = self.socket.send_to(text.as_bytes(), addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
            GameMessage::BroadcastPacket { packet } => {
                let text = packet.encode();
                for addr in self.session.client_addrs() {
                    if let Err(e) = self.socket.send_to(text.as_bytes(), addr).await {
                        error!("Failed to send to client at {}: {}", addr, e);
                    }
                }
            }
        }
    }
}

/// Receive errors that UDP sockets report for conditions unrelated to the
/// server itself, such as an ICMP unreachable caused by an earlier send.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ServerPacket;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            seed: Some(11),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8999");
        assert_eq!(config.tick_duration, Duration::from_millis(16));
        assert_eq!(config.recv_timeout, Duration::from_millis(5));
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let config = ServerConfig {
            bind_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        match tokio_test::block_on(Server::new(config)) {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, "not-an-address"),
            Err(e) => panic!("Unexpected error: {}", e),
            Ok(_) => panic!("Bind should fail"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_ok() {
        let mut server = Server::new(local_config()).await.unwrap();
        server.shutdown_handle().shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), server.run()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_connect_is_acknowledged() {
        let mut server = Server::new(local_config()).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let mut status = server.status();
        let handle = tokio::spawn(async move { server.run().await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"Conexion", server_addr).await.unwrap();

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buffer[..len], b"OK");

        tokio::time::timeout(Duration::from_secs(2), status.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.borrow().client_count, 1);
        assert!(!status.borrow().started);

        shutdown.shutdown();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_ticking() {
        let mut server = Server::new(local_config()).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        // An IPv6 peer cannot be reached from the IPv4 socket, so every send to
        // it fails.
        let unreachable: SocketAddr = "[::1]:9".parse().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let reachable = client.local_addr().unwrap();

        for addr in [unreachable, reachable] {
            server.session.handle_datagram(b"Conexion", addr);
            server.session.handle_datagram(b"Listo", addr);
        }
        assert!(server.session.is_started());
        assert_eq!(server.session.client_addrs()[0], unreachable);

        server
            .dispatch(GameMessage::SendPacket {
                packet: ServerPacket::Accepted,
                addr: unreachable,
            })
            .await;

        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await });

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let mut ticks = Vec::new();
        while ticks.len() < 5 {
            let (len, from) =
                tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buffer))
                    .await
                    .unwrap()
                    .unwrap();
            assert_eq!(from, server_addr);
            if let Ok(ServerPacket::Snapshot(snapshot)) = ServerPacket::decode(&buffer[..len]) {
                ticks.push(snapshot.tick);
            }
        }
        assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));

        shutdown.shutdown();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
