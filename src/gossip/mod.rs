//! Peer discovery protocol.
//!
//! Outbound, a gossip cycle ([`engine`]) notifies every known peer about us
//! and our peers, then reads their peer lists, widening the set until no new
//! addresses appear. Inbound, [`notify`] checks the peers another node told
//! us about. [`refresh`] decides when a cycle is due.
pub mod engine;
pub mod messages;
pub mod notify;
pub mod refresh;

pub use engine::{run_cycle, CycleOutcome};
pub use messages::{NotifyRequest, PeersResponse, ServiceInfo};
pub use notify::{handle_notify, parse_notify, NotifyOutcome};
pub use refresh::{RefreshState, RefreshTicket};
