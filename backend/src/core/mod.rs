//! Core runtime primitives shared by every component

pub mod cancel;

pub use cancel::CancellationToken;
