//! In-process relay server for integration tests
//!
//! A minimal publicly-dialable relay node: circuit relay v2 server plus
//! identify and ping, listening on an ephemeral localhost port.

use futures::StreamExt;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{identify, identity, multiaddr::Protocol, noise, ping, relay, tcp, yamux};
use libp2p::{Multiaddr, PeerId};

#[derive(NetworkBehaviour)]
struct RelayServerBehaviour {
    relay: relay::Behaviour,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

/// Handle to a spawned relay server
pub struct TestRelay {
    pub peer_id: PeerId,
    /// Full dialable address, terminal `/p2p/<relay-id>` included
    pub address: Multiaddr,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a relay server on an ephemeral localhost port
pub async fn spawn_relay() -> TestRelay {
    let keypair = identity::Keypair::generate_ed25519();
    let peer_id = keypair.public().to_peer_id();

    let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )
        .expect("tcp transport")
        .with_behaviour(|key| RelayServerBehaviour {
            relay: relay::Behaviour::new(key.public().to_peer_id(), relay::Config::default()),
            identify: identify::Behaviour::new(identify::Config::new(
                "/peerlink/id/1.0.0".to_string(),
                key.public(),
            )),
            ping: ping::Behaviour::new(ping::Config::new()),
        })
        .expect("behaviour")
        .build();

    swarm
        .listen_on("/ip4/127.0.0.1/tcp/0".parse().expect("valid multiaddr"))
        .expect("listen on localhost");

    let address = loop {
        if let SwarmEvent::NewListenAddr { address, .. } = swarm.select_next_some().await {
            break address;
        }
    };
    // Reservation responses carry the relay's external addresses; without one
    // registered the client rejects the reservation (NoAddressesInReservation).
    swarm.add_external_address(address.clone());

    let task = tokio::spawn(async move {
        loop {
            let _ = swarm.select_next_some().await;
        }
    });

    TestRelay {
        peer_id,
        address: address.with(Protocol::P2p(peer_id)),
        task,
    }
}
