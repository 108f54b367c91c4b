//! A simulated packet-forwarder gateway.
//!
//! One UDP socket per gateway, connected to the network server. Uplinks from
//! every node are pushed on a fixed interval while inbound frames are
//! classified on the same task.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lorhammer_config::GatewayConfig;
use lorhammer_protocols::{
    encode_pull_data, encode_push_data, handle_packet, random_token, GatewayIdentity, InboundPacket,
};
use lorhammer_telemetry::MetricsRecorder;

use crate::node::Node;
use crate::SimulatorError;

/// Largest datagram the forwarder protocol produces.
const MAX_DATAGRAM: usize = 65_507;

/// Counters of one gateway run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GatewayStats {
    pub push_data_sent: u64,
    pub push_acks: u64,
    pub pull_acks: u64,
    pub pull_responses: u64,
    pub unknown: u64,
    pub decode_errors: u64,
}

impl GatewayStats {
    pub fn add(&mut self, other: &GatewayStats) {
        self.push_data_sent += other.push_data_sent;
        self.push_acks += other.push_acks;
        self.pull_acks += other.pull_acks;
        self.pull_responses += other.pull_responses;
        self.unknown += other.unknown;
        self.decode_errors += other.decode_errors;
    }
}

pub struct Gateway {
    identity: GatewayIdentity,
    nodes: Vec<Node>,
    ns_address: SocketAddr,
    send_interval: Duration,
    metrics: Option<MetricsRecorder>,
}

impl Gateway {
    pub fn new(
        identity: GatewayIdentity,
        nodes: Vec<Node>,
        ns_address: SocketAddr,
        send_interval: Duration,
    ) -> Self {
        Self {
            identity,
            nodes,
            ns_address,
            send_interval,
            metrics: None,
        }
    }

    /// A gateway with a random MAC and a random node count in the configured range.
    pub fn random(config: &GatewayConfig) -> Result<Self, SimulatorError> {
        config.check_node_range()?;
        let ns_address = parse_address(&config.ns_address)?;
        let nb_node = rand::rng().random_range(config.min_nb_node..=config.max_nb_node);
        let nodes = (0..nb_node)
            .map(|_| Node::random(config.payload_len))
            .collect();
        let identity = GatewayIdentity::new(rand::random()).with_rxpk_date(config.rxpk_date);
        Ok(Self::new(
            identity,
            nodes,
            ns_address,
            Duration::from_millis(config.send_interval_ms),
        ))
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn identity(&self) -> &GatewayIdentity {
        &self.identity
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Runs until `cancel` fires. Only socket setup errors end the run early.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<GatewayStats, SimulatorError> {
        let local: SocketAddr = if self.ns_address.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.ns_address).await?;

        let mac = self.identity.mac_hex();
        info!(gateway = %mac, nodes = self.nodes.len(), ns = %self.ns_address, "Gateway started");

        let mut stats = GatewayStats::default();
        socket
            .send(&encode_pull_data(&self.identity, random_token()))
            .await?;

        let mut ticker = time::interval(self.send_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = socket.recv(&mut buf) => match received {
                    Ok(len) => self.record_inbound(&buf[..len], &mut stats),
                    // ICMP unreachable surfaces here on connected sockets
                    Err(e) => debug!(gateway = %mac, error = %e, "Receive failed"),
                },
                _ = ticker.tick() => self.push_uplinks(&socket, &mac, &mut stats).await,
            }
        }

        info!(
            gateway = %mac,
            sent = stats.push_data_sent,
            acks = stats.push_acks,
            "Gateway stopped"
        );
        Ok(stats)
    }

    async fn push_uplinks(&mut self, socket: &UdpSocket, mac: &str, stats: &mut GatewayStats) {
        for node in &mut self.nodes {
            let frame = match encode_push_data(&node.next_uplink(), &self.identity) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(gateway = %mac, error = %e, "Failed to encode uplink");
                    continue;
                }
            };
            match socket.send(&frame).await {
                Ok(_) => {
                    stats.push_data_sent += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.push_data_sent.inc();
                    }
                }
                Err(e) => debug!(gateway = %mac, error = %e, "Send failed"),
            }
        }
    }

    fn record_inbound(&self, data: &[u8], stats: &mut GatewayStats) {
        let kind = match handle_packet(data) {
            Ok(InboundPacket::PushAck { .. }) => {
                stats.push_acks += 1;
                "push_ack"
            }
            Ok(InboundPacket::PullAck { .. }) => {
                stats.pull_acks += 1;
                "pull_ack"
            }
            Ok(InboundPacket::PullResponse(_)) => {
                stats.pull_responses += 1;
                "pull_resp"
            }
            Ok(InboundPacket::Unknown { .. }) => {
                stats.unknown += 1;
                "unknown"
            }
            Err(_) => {
                stats.decode_errors += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.decode_errors.inc();
                }
                return;
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_received(kind);
        }
    }
}

fn parse_address(address: &str) -> Result<SocketAddr, SimulatorError> {
    address
        .parse()
        .map_err(|source| SimulatorError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}
