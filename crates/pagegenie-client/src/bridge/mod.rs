//! Local channel: a correlated message bridge between the content side
//! ([`BridgeClient`]) and the page side that owns the on-device models
//! ([`BridgeHost`]).

pub mod client;
pub mod host;
pub mod pending;
pub mod protocol;

pub use client::{BridgeClient, BridgeClientConfig};
pub use host::BridgeHost;
pub use protocol::{link, BridgeEnd, BridgeMessage};
