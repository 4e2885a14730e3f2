pub mod client;
pub mod jetstream_broker;

pub use client::{jetstream_stream_name, NatsClient};
pub use jetstream_broker::JetStreamBroker;
