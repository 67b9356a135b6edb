//! Transport events and overlay address helpers

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};

/// Transport observations, decoupled from the swarm so state updates are
/// testable without a live transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ConnectionOpened { peer: PeerId, address: Multiaddr },
    ConnectionClosed { peer: PeerId },
    NewListenAddress { address: Multiaddr },
    ReachableAddressLearned { address: Multiaddr },
    RelayReservationAccepted { relay: PeerId },
}

/// Build the relay-circuit address for `peer` behind `relay`:
/// `<relay>/p2p-circuit/p2p/<peer>`.
pub fn circuit_address(relay: &Multiaddr, peer: PeerId) -> Multiaddr {
    relay
        .clone()
        .with(Protocol::P2pCircuit)
        .with(Protocol::P2p(peer))
}

/// The terminal peer id of an overlay address, if present.
pub fn peer_id_from_addr(addr: &Multiaddr) -> Option<PeerId> {
    let protocols: Vec<Protocol<'_>> = addr.iter().collect();
    protocols.into_iter().rev().find_map(|protocol| match protocol {
        Protocol::P2p(peer) => Some(peer),
        _ => None,
    })
}

/// Whether this address is WebRTC-style, i.e. reachability is probed rather
/// than awaited as a dial.
pub fn is_webrtc(addr: &Multiaddr) -> bool {
    addr.iter()
        .any(|protocol| matches!(protocol, Protocol::WebRTC | Protocol::WebRTCDirect))
}
