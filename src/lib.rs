//! powledger - A single-node append-only ledger sealed by proof-of-work
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the chain, canonical hashing and chain validation
//! - [`transaction`] - Transaction type and request shape checks
//! - [`mempool`] - Transactions waiting for the next block
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work search, verification and block sealing
//!
//! ## Integration
//! - [`api`] - HTTP endpoints (axum)
//! - [`node`] - Process bootstrap
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
