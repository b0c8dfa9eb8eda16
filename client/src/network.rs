use crate::mirror::{describe, parse_value, OptionMirror};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{OptionOp, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Interval between keep-alive packets, well inside the server's timeout
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,
    user_id: Option<String>,

    mirror: OptionMirror,
    /// `KEY=VALUE` proposals not sent yet because the option is not visible
    pending: Vec<(String, String)>,

    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        user_id: Option<String>,
        proposals: Vec<(String, String)>,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            user_id,
            mirror: OptionMirror::new(),
            pending: proposals,
            fake_ping_ms,
        })
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn mirror(&self) -> &OptionMirror {
        &self.mirror
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            user_id: self.user_id.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn apply_options(&mut self, ops: &[OptionOp]) {
        for op in ops {
            match op {
                OptionOp::Set(option) => {
                    info!("{} = {}", option.key, describe(&option.value))
                }
                OptionOp::Delete(key) => info!("{} removed", key),
            }
        }
        self.mirror.apply_all(ops);
    }

    /// Sends every pending proposal whose option is now visible
    async fn flush_proposals(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        for (key, input) in pending {
            let Some(existing) = self.mirror.get(&key).map(|option| option.value.clone()) else {
                self.pending.push((key, input));
                continue;
            };

            let proposal = parse_value(&existing, &input)
                .and_then(|value| self.mirror.propose(&key, &value));
            match proposal {
                Some(value) => {
                    info!("Proposing {} = {}", key, describe(&value));
                    self.send_packet(&Packet::SetOption { key, value }).await?;
                }
                None => warn!("'{}' is not a valid value for {}", input, key),
            }
        }

        Ok(())
    }

    /// Returns false once the server has ended the session
    async fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
            }

            Packet::Options { ops } => {
                debug!("Received {} option operations", ops.len());
                self.apply_options(&ops);
                if let Err(e) = self.flush_proposals().await {
                    error!("Error sending proposals: {}", e);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                return false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
        true
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                if !self.handle_packet(packet).await {
                                    break;
                                }
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Leaving room");
                    if self.connected {
                        self.send_packet(&Packet::Disconnect).await?;
                    }
                    break;
                },
            }
        }

        if !self.mirror.is_empty() {
            info!("Final options:\n{}", self.mirror.render());
        }

        Ok(())
    }
}
