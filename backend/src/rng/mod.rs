//! Deterministic random number generation
//!
//! Uses the xorshift64* algorithm. The transaction generator draws every
//! random choice (account, type, amount) from here, so a fixed seed replays
//! the same transaction stream.

mod xorshift;

pub use xorshift::RngManager;
