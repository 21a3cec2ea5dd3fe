// Thin re-export module: implementation is in `blockchain/core.rs` so block
// types, validation and chain management can evolve independently.

pub mod core;
pub use core::*;
