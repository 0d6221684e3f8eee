//! Digest computation and object identity for the vecr version-control core.
//!
//! Content addressing is SHA-256 throughout: a digest is 32 raw bytes,
//! rendered as 64 lowercase hex characters. Mixing widths anywhere in the
//! system is a fatal error, so this crate is the single source of truth for
//! both constants.

mod error;
mod oid;
pub mod fanout;
pub mod hasher;
pub mod hex;

pub use error::HashError;
pub use oid::ObjectId;

/// Width of a digest in raw bytes.
pub const DIGEST_LEN: usize = 32;

/// Width of a digest in hex characters.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;
