//! Distributed Key-Value Store Library
//!
//! This library crate defines the core modules shared by the two binaries:
//! the cluster controller (`bin/controller.rs`) and the storage node
//! (`bin/node.rs`).
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled subsystems:
//!
//! - **`cluster`**: The shared vocabulary. Wire types for entries, chunks and
//!   the membership list, plus the pure placement function mapping a key onto
//!   its replica window.
//! - **`storage`**: A node's local, durable side. The RocksDB adapter, the
//!   single-consumer durable writer with its observable write delay, and the
//!   LRU/TTL read cache.
//! - **`node`**: The node-side distributed logic. The replication engine
//!   (write fan-out, read fallback, rehash), the membership agent tracking
//!   the controller's view, and the node HTTP surface.
//! - **`controller`**: The authoritative membership service. Health probing,
//!   failure detection with automatic replacement, membership compaction and
//!   change broadcasts, plus the operator HTTP surface.

pub mod cluster;
pub mod controller;
pub mod error;
pub mod node;
pub mod storage;
