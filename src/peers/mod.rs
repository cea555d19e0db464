//! Peer bookkeeping: addresses, the durable registry and the transient
//! sets used to avoid dead or busy peers.
pub mod dead_peers;
pub mod in_flight;
pub mod peer_url;
pub mod registry;

pub use dead_peers::DeadPeerCache;
pub use in_flight::{InFlightGuard, InFlightSet};
pub use peer_url::PeerUrl;
pub use registry::{PeerRegistry, SqlitePeerRegistry};
