//! Blockverse - a peer-to-peer blockchain node
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Blocks, block validation and the height-indexed chain
//! - [`transaction`] - Transaction types, hashing and signature checks
//! - [`mempool`] - Pending transaction pool
//! - [`validator`] - Timer-driven block producer
//!
//! ## Cryptography
//! - [`crypto`] - secp256k1 keys, signatures and canonical hashing
//!
//! ## Storage
//! - [`persistence`] - Block stores (memory, SQLite)
//!
//! ## Networking
//! - [`network`] - Handshake, peer discovery, gossip and transports
//! - [`node`] - Node orchestration and logging setup
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;
pub mod validator;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Storage
// ============================================================================
pub mod persistence;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
