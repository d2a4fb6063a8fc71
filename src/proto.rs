//! Re-exported protobuf and gRPC types for the pubsub service.

pub use cachewire_proto::pubsub;
