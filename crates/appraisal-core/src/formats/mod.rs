//! # Formats Module
//!
//! Encoding of stored records and of whole-database snapshots.
//!
//! This module contains:
//! - Record encoding (format version byte + postcard)
//! - Snapshot export/import, binary (magic header + postcard) and JSON
//!
//! File I/O stays in the app layer (apps/appraisal). These are pure
//! byte/struct conversions.

mod persistence;

pub use persistence::*;
