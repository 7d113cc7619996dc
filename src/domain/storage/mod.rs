//! Storage contract and key-space layout

pub mod keyspace;
pub mod kv;

pub use kv::{KeyValueStore, KvEntry, ListOptions, WriteBatch, WriteOp};
