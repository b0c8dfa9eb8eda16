//! Server network layer handling UDP communications and room coordination

use crate::client_manager::ClientManager;
use crate::room::Room;
use crate::transport::Transport;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{OptionOp, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from the room to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        /// Restricts delivery to these clients when set
        include: Option<Vec<u32>>,
        exclude: Vec<u32>,
    },
}

impl GameMessage {
    /// Whether a broadcast should reach `client_id`
    pub fn addresses(&self, client_id: u32) -> bool {
        match self {
            GameMessage::SendPacket { .. } => false,
            GameMessage::BroadcastPacket {
                include, exclude, ..
            } => {
                include
                    .as_ref()
                    .map_or(true, |include| include.contains(&client_id))
                    && !exclude.contains(&client_id)
            }
        }
    }
}

/// Runtime settings for [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    /// Period of the full option resync to every client, `None` to disable
    pub resync_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_clients: 15,
            resync_interval: None,
        }
    }
}

/// [`Transport`] that queues option batches for the sender task
///
/// The queue is unbounded and drained in order, so batches reach each client
/// in the order the room produced them.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelTransport {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl Transport for ChannelTransport {
    fn broadcast(&mut self, ops: Vec<OptionOp>, include: Option<&[u32]>, exclude: &[u32]) {
        if ops.is_empty() {
            return;
        }
        let message = GameMessage::BroadcastPacket {
            packet: Packet::Options { ops },
            include: include.map(<[u32]>::to_vec),
            exclude: exclude.to_vec(),
        };
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue options: {}", e);
        }
    }
}

/// Main server coordinating networking and the option room
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    room: Room,
    transport: ChannelTransport,
    resync_interval: Option<Duration>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig, room: Room) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr.as_str()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            room,
            transport: ChannelTransport::new(game_tx.clone()),
            resync_interval: config.resync_interval.filter(|period| !period.is_zero()),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Handle for stopping the server loop with [`ServerMessage::Shutdown`]
    pub fn control_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match &message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, packet, *addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, .. } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if !message.addresses(client_id) {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn client_for(&self, addr: SocketAddr) -> Option<u32> {
        let mut clients = self.clients.write().await;
        let client_id = clients.find_client_by_addr(addr)?;
        clients.touch(client_id);
        Some(client_id)
    }

    async fn disconnect_client(&mut self, client_id: u32) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id)
        };
        if removed {
            self.room.on_client_left(client_id);
        }
    }

    /// Processes incoming packets and forwards option traffic to the room
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                user_id,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr).await;
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.disconnect_client(existing_id).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, user_id.clone())
                };

                if let Some(client_id) = client_id {
                    self.send_packet(Packet::Connected { client_id }, addr).await;
                    self.room
                        .on_client_joined(client_id, user_id.as_deref(), &mut self.transport);
                } else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(response, addr).await;
                }
            }

            Packet::Heartbeat => {
                if self.client_for(addr).await.is_none() {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::SetOption { key, value } => match self.client_for(addr).await {
                Some(client_id) => {
                    self.room
                        .handle_set_option(client_id, &key, value, &mut self.transport);
                }
                None => warn!("Option proposal from unknown address {}", addr),
            },

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.disconnect_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Sends every option to every connected client
    async fn resync_all(&mut self) {
        let client_ids = {
            let clients = self.clients.read().await;
            clients.client_ids()
        };
        if client_ids.is_empty() {
            return;
        }

        let chunks = self.room.sync_for(&client_ids, &mut self.transport);
        debug!(
            "Resynced {} options to {} clients in {} chunks",
            self.room.store().len(),
            client_ids.len(),
            chunks
        );
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let resync_enabled = self.resync_interval.is_some();
        let mut resync_interval =
            interval(self.resync_interval.unwrap_or(Duration::from_secs(3600)));

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.room.on_client_left(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            if let Some(creator) = self.room.creator() {
                                self.room.on_client_left(creator);
                            }
                            break;
                        }
                    }
                },

                // Periodic full resync
                _ = resync_interval.tick(), if resync_enabled => {
                    self.resync_all().await;
                },
            }
        }

        Ok(())
    }
}
