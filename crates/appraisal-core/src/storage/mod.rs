//! # Storage Module
//!
//! Durable storage for review-cycle records using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (one write transaction per mutation)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Uniqueness rules (period names, one card per employee and period, ...)
//! are kept in an index table updated in the same transaction as the record.

mod redb_store;

pub use redb_store::{ReadTx, Record, Store, UniqueKey, WriteTx, unique_key};
