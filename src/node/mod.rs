//! Storage Node Module
//!
//! Everything a single storage node runs besides its local storage stack:
//! the replicated placement engine, the membership agent that tracks the
//! controller's view, the peer HTTP client, and the node's HTTP surface.
//!
//! ## Core Concepts
//! - **View**: each node keeps its own copy of the `Network` plus its own ID,
//!   refreshed from the controller on every membership notification.
//! - **Replication**: writes fan out to every node in the key's replica
//!   window; reads fall back across replicas until one answers.
//! - **Rehash**: after a membership change, every locally held entry is
//!   re-placed under the new topology — shipped to its new owners and
//!   deleted here when ownership moved away.
//! - **Catchup**: a respawned node pulls chunks from its ID-space neighbours
//!   to refill the shard it lost while offline.

pub mod agent;
pub mod client;
pub mod engine;
pub mod handlers;
pub mod view;

#[cfg(test)]
mod tests;
