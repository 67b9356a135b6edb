mod node_service;

pub use node_service::P2pNodeServiceImpl;
