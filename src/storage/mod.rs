//! Node Storage Module
//!
//! The local, durable side of a storage node. The replication engine never
//! touches the database directly; everything goes through the pieces here.
//!
//! ## Core Concepts
//! - **Adapter**: `KvStore` wraps the embedded RocksDB instance with typed
//!   put/get/delete/scan operations and idempotent provisioning.
//! - **Serialized writes**: `DurableWriter` funnels all mutations through a
//!   single consumer, so concurrent request handlers never contend on the
//!   store. The writer's lag is observable and returned on every write.
//! - **Read cache**: `LruTtlCache` fronts reads and local writes with a
//!   capacity-bounded, TTL-expiring LRU.

pub mod cache;
pub mod store;
pub mod writer;
