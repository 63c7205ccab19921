//! Common types and utilities for the ndnfw forwarding engine.
//!
//! This crate provides the packet model (names, Interests, Data, Nacks),
//! the TLV wire codec used at transport boundaries, and shared error and
//! metrics primitives. The forwarding plane itself lives in
//! `rust-ndnfw-core`.

pub mod error;
pub mod metrics;
pub mod ndn;
pub mod tlv;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
