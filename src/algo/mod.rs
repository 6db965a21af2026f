//! Mesh processing algorithms.
//!
//! Currently provides quadric error metric decimation ([`decimate`]) and the
//! [`progress`] callback type shared by long-running operations.

pub mod decimate;
pub mod progress;
