//! Cluster Controller Module
//!
//! The controller owns the authoritative membership list and keeps it alive:
//! it probes every node on a fixed interval, replaces nodes that stay
//! unreachable past the grace period, and broadcasts every membership change
//! so the nodes can rehash their shards.
//!
//! ## Core Mechanisms
//! - **Membership lock**: one mutex guards every read-modify-write of the
//!   list; IDs always equal list indices after a mutation.
//! - **Health loop**: probes on a 5 second interval; a failed probe marks a
//!   node unreachable and arms a replacement watcher.
//! - **Replacement**: after 16 seconds of unreachability the node is declared
//!   dead and respawned at the same address and ID, then told to catch up.
//! - **Broadcast**: fire-and-forget notifications; the nodes re-download the
//!   list themselves, so delivery is idempotent.

pub mod handlers;
pub mod service;
pub mod spawner;

#[cfg(test)]
mod tests;
