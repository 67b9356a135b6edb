pub mod config;
pub mod core_bridge;
pub mod core_identity;
pub mod core_node;
pub mod core_router;
pub mod logging;
pub mod metrics;
pub mod shutdown;
pub mod test_utils;

pub use config::Config;
pub use core_bridge::RpcBridge;
pub use core_identity::PeerIdentity;
pub use core_node::{NodeHandle, NodeManager};
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure the main exports are accessible
        let _ = LogLevel::Info;
        let _ = Config::default();
    }
}
