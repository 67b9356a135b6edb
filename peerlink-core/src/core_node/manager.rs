//! Connection manager
//!
//! Brings the node up over the overlay transport, owns the swarm in one
//! dedicated task, and exposes a command handle plus a broadcast event channel
//! to the rest of the process. The dialing strategy branches on address kind:
//! WebRTC-style addresses are validated with a ping probe, everything else is
//! an explicit dial. Every dial and probe resolves within the configured
//! timeout.

use super::behaviour::{NodeBehaviour, NodeBehaviourEvent};
use super::context::{NodeContext, NodeState};
use super::events::{circuit_address, is_webrtc, peer_id_from_addr, TransportEvent};
use super::NodeError;
use crate::config::NodeConfig;
use crate::core_identity::PeerIdentity;
use crate::metrics::CONNECTIONS_ACTIVE;
use futures::StreamExt;
use libp2p::multiaddr::Protocol;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::{ConnectionId, DialError, Swarm, SwarmEvent};
use libp2p::{identify, noise, ping, relay, tcp, yamux, Multiaddr, PeerId, StreamProtocol};
use metrics::gauge;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Commands sent to the swarm task
enum Command {
    Dial {
        address: Multiaddr,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    /// Dial an address and report a ping round-trip from its peer
    Probe {
        address: Multiaddr,
        reply: oneshot::Sender<Result<Duration, NodeError>>,
    },
    ListenOn {
        address: Multiaddr,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    ListenAddresses {
        reply: oneshot::Sender<Vec<Multiaddr>>,
    },
    Shutdown,
}

/// Handle to a running node
#[derive(Clone)]
pub struct NodeHandle {
    context: Arc<NodeContext>,
    command_tx: mpsc::Sender<Command>,
    control: libp2p_stream::Control,
    events_tx: broadcast::Sender<TransportEvent>,
    relay_address: Multiaddr,
    protocol: StreamProtocol,
    dial_timeout: Duration,
}

impl NodeHandle {
    pub fn context(&self) -> &Arc<NodeContext> {
        &self.context
    }

    pub fn peer_id(&self) -> PeerId {
        self.context.peer_id()
    }

    pub fn relay_address(&self) -> &Multiaddr {
        &self.relay_address
    }

    /// The relay-circuit address through which `peer` is reached
    pub fn circuit_address_for(&self, peer: PeerId) -> Multiaddr {
        circuit_address(&self.relay_address, peer)
    }

    /// Subscribe to transport events
    pub fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events_tx.subscribe()
    }

    /// Dial an address, resolving within the configured dial timeout.
    /// Dialing an already-connected peer succeeds without a new connection.
    pub async fn dial(&self, address: Multiaddr) -> Result<(), NodeError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Dial { address, reply: tx })
            .await
            .map_err(|_| NodeError::ChannelClosed)?;

        match tokio::time::timeout(self.dial_timeout, rx).await {
            Err(_) => Err(NodeError::DialTimeout(self.dial_timeout)),
            Ok(Err(_)) => Err(NodeError::ChannelClosed),
            Ok(Ok(result)) => result,
        }
    }

    /// Validate reachability of an address with a ping round-trip.
    ///
    /// The waiter is registered by the swarm task together with the dial, so
    /// a round-trip completed right after connection establishment is never
    /// missed.
    pub async fn probe(&self, address: Multiaddr) -> Result<Duration, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Probe { address, reply: tx })
            .await
            .map_err(|_| NodeError::ChannelClosed)?;

        match tokio::time::timeout(self.dial_timeout, rx).await {
            Err(_) => Err(NodeError::Probe(format!(
                "no ping round-trip within {:?}",
                self.dial_timeout
            ))),
            Ok(Err(_)) => Err(NodeError::ChannelClosed),
            Ok(Ok(result)) => result,
        }
    }

    /// Establish a connection to an address, probing WebRTC-style addresses
    /// and dialing everything else.
    pub async fn connect(&self, address: &Multiaddr) -> Result<(), NodeError> {
        info!(%address, "Attempting connection");
        if is_webrtc(address) {
            let rtt = self.probe(address.clone()).await?;
            info!(%address, rtt_ms = rtt.as_millis() as u64, "Reachability probe succeeded");
        } else {
            self.dial(address.clone()).await?;
            info!(%address, "Connected");
        }
        Ok(())
    }

    /// Connect to the bootstrap relay and request a circuit reservation.
    ///
    /// Failure leaves the node degraded but alive: it keeps serving inbound
    /// requests reachable by other means, with no reachable address learned.
    pub async fn connect_to_relay(&self) -> Result<(), NodeError> {
        self.context.set_state(NodeState::RelayConnecting).await;
        match self.connect(&self.relay_address.clone()).await {
            Ok(()) => {
                self.context.set_state(NodeState::RelayConnected).await;
                self.listen_on(self.relay_address.clone().with(Protocol::P2pCircuit))
                    .await
            }
            Err(e) => {
                self.context.set_state(NodeState::Listening).await;
                Err(e)
            }
        }
    }

    /// Start listening on an address
    pub async fn listen_on(&self, address: Multiaddr) -> Result<(), NodeError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::ListenOn { address, reply: tx })
            .await
            .map_err(|_| NodeError::ChannelClosed)?;
        rx.await.map_err(|_| NodeError::ChannelClosed)?
    }

    /// Addresses the swarm is currently listening on
    pub async fn listen_addresses(&self) -> Result<Vec<Multiaddr>, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::ListenAddresses { reply: tx })
            .await
            .map_err(|_| NodeError::ChannelClosed)?;
        rx.await.map_err(|_| NodeError::ChannelClosed)
    }

    /// Open a fresh application-protocol stream to a connected peer
    pub async fn open_stream(&self, peer: PeerId) -> Result<libp2p::Stream, NodeError> {
        self.control
            .clone()
            .open_stream(peer, self.protocol.clone())
            .await
            .map_err(|e| NodeError::OpenStream(e.to_string()))
    }

    /// Stop the swarm task
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }
}

/// The swarm task: owns all libp2p state
pub struct NodeManager {
    swarm: Swarm<NodeBehaviour>,
    context: Arc<NodeContext>,
    command_rx: mpsc::Receiver<Command>,
    events_tx: broadcast::Sender<TransportEvent>,
    pending_dials: HashMap<ConnectionId, oneshot::Sender<Result<(), NodeError>>>,
    pending_probes: HashMap<PeerId, Vec<oneshot::Sender<Result<Duration, NodeError>>>>,
    /// Last observed ping round-trip per connected peer; answers probes of
    /// already-established connections without waiting a full ping interval
    recent_rtts: HashMap<PeerId, Duration>,
    /// `<relay>/p2p-circuit/p2p/<self>`: the address remote peers dial
    expected_circuit_addr: Multiaddr,
    /// `<relay>/p2p-circuit`: the listener form of the same address
    circuit_listen_addr: Multiaddr,
}

impl NodeManager {
    /// Build the swarm, register the application protocol, start listening
    /// and spawn the swarm task.
    ///
    /// Returns the node handle and the inbound stream source for the
    /// application protocol. The protocol is registered before any dial.
    pub async fn start(
        identity: PeerIdentity,
        config: &NodeConfig,
    ) -> Result<(NodeHandle, libp2p_stream::IncomingStreams), NodeError> {
        let relay_address: Multiaddr =
            config
                .relay_address
                .parse()
                .map_err(|e: libp2p::multiaddr::Error| NodeError::InvalidAddress {
                    address: config.relay_address.clone(),
                    reason: e.to_string(),
                })?;
        let protocol = StreamProtocol::try_from_owned(config.protocol.clone())
            .map_err(|e| NodeError::Protocol(e.to_string()))?;

        let peer_id = identity.peer_id();
        let context = Arc::new(NodeContext::new(peer_id, config.name.clone()));
        context.set_state(NodeState::Initializing).await;

        let mut swarm = libp2p::SwarmBuilder::with_existing_identity(identity.keypair().clone())
            .with_tokio()
            .with_tcp(
                tcp::Config::default().nodelay(true),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_dns()
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_websocket(noise::Config::new, yamux::Config::default)
            .await
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_relay_client(noise::Config::new, yamux::Config::default)
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_behaviour(|key, relay_client| NodeBehaviour::new(key, relay_client))
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(config.idle_connection_timeout))
            .build();

        let mut control = swarm.behaviour().stream.new_control();
        let incoming = control
            .accept(protocol.clone())
            .map_err(|e| NodeError::Protocol(e.to_string()))?;

        for address in &config.listen_addresses {
            let address: Multiaddr =
                address
                    .parse()
                    .map_err(|e: libp2p::multiaddr::Error| NodeError::InvalidAddress {
                        address: address.clone(),
                        reason: e.to_string(),
                    })?;
            swarm
                .listen_on(address)
                .map_err(|e| NodeError::Listen(e.to_string()))?;
        }

        info!(%peer_id, "Node started");
        context.set_state(NodeState::Listening).await;

        let (command_tx, command_rx) = mpsc::channel(64);
        let (events_tx, _) = broadcast::channel(64);

        let manager = NodeManager {
            swarm,
            context: context.clone(),
            command_rx,
            events_tx: events_tx.clone(),
            pending_dials: HashMap::new(),
            pending_probes: HashMap::new(),
            recent_rtts: HashMap::new(),
            expected_circuit_addr: circuit_address(&relay_address, peer_id),
            circuit_listen_addr: relay_address.clone().with(Protocol::P2pCircuit),
        };
        tokio::spawn(manager.run());

        let handle = NodeHandle {
            context,
            command_tx,
            control,
            events_tx,
            relay_address,
            protocol,
            dial_timeout: config.dial_timeout,
        };
        Ok((handle, incoming))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.swarm.select_next_some() => self.handle_swarm_event(event).await,
            }
        }
        debug!("Swarm task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dial { address, reply } => {
                let opts = match peer_id_from_addr(&address) {
                    Some(peer) => DialOpts::peer_id(peer).addresses(vec![address]).build(),
                    None => DialOpts::unknown_peer_id().address(address).build(),
                };
                let connection_id = opts.connection_id();
                match self.swarm.dial(opts) {
                    Ok(()) => {
                        self.pending_dials.insert(connection_id, reply);
                    }
                    // Already connected: the dial condition is
                    // intentionally unmet, treat as success.
                    Err(DialError::DialPeerConditionFalse(_)) => {
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(NodeError::Dial(e.to_string())));
                    }
                }
            }
            // Registering the waiter and dialing happen in one command, so
            // the first ping after connection establishment cannot slip past
            // the waiter.
            Command::Probe { address, reply } => {
                let Some(peer) = peer_id_from_addr(&address) else {
                    let _ = reply.send(Err(NodeError::MissingPeerId(address)));
                    return;
                };
                let opts = DialOpts::peer_id(peer).addresses(vec![address]).build();
                match self.swarm.dial(opts) {
                    Ok(()) => {
                        self.pending_probes.entry(peer).or_default().push(reply);
                    }
                    Err(DialError::DialPeerConditionFalse(_)) => {
                        // Already connected: the last observed round-trip
                        // answers immediately; otherwise wait for the next
                        // interval ping.
                        match self.recent_rtts.get(&peer) {
                            Some(rtt) => {
                                let _ = reply.send(Ok(*rtt));
                            }
                            None => {
                                self.pending_probes.entry(peer).or_default().push(reply);
                            }
                        }
                    }
                    Err(e) => {
                        let _ = reply.send(Err(NodeError::Dial(e.to_string())));
                    }
                }
            }
            Command::ListenOn { address, reply } => {
                let result = self
                    .swarm
                    .listen_on(address)
                    .map(|_| ())
                    .map_err(|e| NodeError::Listen(e.to_string()));
                let _ = reply.send(result);
            }
            Command::ListenAddresses { reply } => {
                let _ = reply.send(self.swarm.listeners().cloned().collect());
            }
            Command::Shutdown => unreachable!("handled in run()"),
        }
    }

    async fn handle_swarm_event(&mut self, event: SwarmEvent<NodeBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "Listening on");
                let _ = self.events_tx.send(TransportEvent::NewListenAddress {
                    address: address.clone(),
                });
                // The circuit listener may be reported with or without the
                // terminal peer id; the canonical dialable form is recorded.
                if address == self.expected_circuit_addr || address == self.circuit_listen_addr {
                    let reachable = self.expected_circuit_addr.clone();
                    info!(address = %reachable, "Learned externally dialable address");
                    self.context.set_reachable_address(reachable.clone()).await;
                    self.context.set_state(NodeState::AddressLearned).await;
                    let _ = self
                        .events_tx
                        .send(TransportEvent::ReachableAddressLearned { address: reachable });
                }
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                ..
            } => {
                if let Some(reply) = self.pending_dials.remove(&connection_id) {
                    let _ = reply.send(Ok(()));
                }
                let address = endpoint.get_remote_address().clone();
                self.context.connection_opened(peer_id, address.clone()).await;
                self.refresh_connection_list().await;
                let _ = self.events_tx.send(TransportEvent::ConnectionOpened {
                    peer: peer_id,
                    address,
                });
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                ..
            } => {
                if num_established == 0 {
                    self.context.connection_closed(peer_id).await;
                    self.recent_rtts.remove(&peer_id);
                    self.fail_probes(peer_id, "connection closed");
                }
                self.refresh_connection_list().await;
                let _ = self
                    .events_tx
                    .send(TransportEvent::ConnectionClosed { peer: peer_id });
            }
            SwarmEvent::OutgoingConnectionError {
                connection_id,
                peer_id,
                error,
            } => {
                warn!(?peer_id, "Outgoing connection failed: {}", error);
                if let Some(reply) = self.pending_dials.remove(&connection_id) {
                    let _ = reply.send(Err(NodeError::Dial(error.to_string())));
                }
                if let Some(peer) = peer_id {
                    self.fail_probes(peer, &error.to_string());
                }
            }
            SwarmEvent::Behaviour(NodeBehaviourEvent::Ping(ping::Event {
                peer, result, ..
            })) => {
                if let Ok(rtt) = &result {
                    self.recent_rtts.insert(peer, *rtt);
                }
                if let Some(waiters) = self.pending_probes.remove(&peer) {
                    for reply in waiters {
                        let outcome = match &result {
                            Ok(rtt) => Ok(*rtt),
                            Err(e) => Err(NodeError::Probe(e.to_string())),
                        };
                        let _ = reply.send(outcome);
                    }
                }
            }
            SwarmEvent::Behaviour(NodeBehaviourEvent::RelayClient(event)) => match event {
                relay::client::Event::ReservationReqAccepted { relay_peer_id, .. } => {
                    info!(relay = %relay_peer_id, "Relay reservation accepted");
                    let _ = self
                        .events_tx
                        .send(TransportEvent::RelayReservationAccepted {
                            relay: relay_peer_id,
                        });
                }
                relay::client::Event::OutboundCircuitEstablished { relay_peer_id, .. } => {
                    debug!(relay = %relay_peer_id, "Outbound relay circuit established");
                }
                relay::client::Event::InboundCircuitEstablished { src_peer_id, .. } => {
                    debug!(src = %src_peer_id, "Inbound relay circuit established");
                }
            },
            SwarmEvent::Behaviour(NodeBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                ..
            })) => {
                debug!(peer = %peer_id, "Identified peer");
            }
            other => trace!(?other, "Swarm event"),
        }
    }

    /// Refresh the active connection list: observability only, never a
    /// control decision.
    async fn refresh_connection_list(&mut self) {
        let connections = self.context.connections().await;
        gauge!(CONNECTIONS_ACTIVE).set(connections.len() as f64);
        for (peer, address) in connections {
            debug!(%peer, %address, "Connection");
        }
    }

    fn fail_probes(&mut self, peer: PeerId, reason: &str) {
        if let Some(waiters) = self.pending_probes.remove(&peer) {
            for reply in waiters {
                let _ = reply.send(Err(NodeError::Probe(reason.to_string())));
            }
        }
    }
}
