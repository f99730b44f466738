//! Peer-sync layer (spec.md §3 "PeerNode", §4.7 "Peer sync"): pull/push
//! `SavedSession`s between broker instances, eventually-consistent
//! last-writer-wins. Enrichment from `groblegark-coop/crates/mux`'s
//! upstream-polling/health-tracking idiom — the teacher has no peer
//! concept of its own.

mod node;
mod sync;

pub use node::{NodeId, PeerAuthMethod, PeerNode, PeerStatus};
pub use sync::{IndexEntry, PeerSyncService, SyncArchive};
