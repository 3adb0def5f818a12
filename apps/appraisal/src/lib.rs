//! # Appraisal Library
//!
//! This library exposes the Appraisal modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod seed;

// Re-export appraisal_core for convenience
pub use appraisal_core;
