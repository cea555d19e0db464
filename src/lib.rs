//! Peer discovery and federated search for independent service nodes.
//!
//! Each node keeps a registry of peer base URLs, gossips with those peers to
//! grow it, and can fan a search out to every peer it knows, merging their
//! answers.
pub mod api;
pub mod cli;
pub mod error;
pub mod gossip;
pub mod node;
pub mod peers;
pub mod queue;
pub mod search;
pub mod settings;
pub mod transport;
