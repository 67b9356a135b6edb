//! Generated gRPC bindings for the `peerlink_node` package

tonic::include_proto!("peerlink_node");
