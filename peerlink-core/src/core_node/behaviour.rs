//! Network behaviour composition

use libp2p::identity::Keypair;
use libp2p::swarm::NetworkBehaviour;
use libp2p::{identify, ping, relay};

/// Identify protocol string advertised to peers.
pub const IDENTIFY_PROTOCOL: &str = "/peerlink/id/1.0.0";

/// Composed behaviour: relay client for circuit reachability, identify and
/// ping as the standard capability set, and the stream behaviour carrying the
/// application protocol.
#[derive(NetworkBehaviour)]
pub struct NodeBehaviour {
    pub relay_client: relay::client::Behaviour,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    pub stream: libp2p_stream::Behaviour,
}

impl NodeBehaviour {
    pub fn new(keypair: &Keypair, relay_client: relay::client::Behaviour) -> Self {
        Self {
            relay_client,
            identify: identify::Behaviour::new(identify::Config::new(
                IDENTIFY_PROTOCOL.to_string(),
                keypair.public(),
            )),
            ping: ping::Behaviour::new(ping::Config::new()),
            stream: libp2p_stream::Behaviour::new(),
        }
    }
}
