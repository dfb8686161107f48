//! Domain models for SHIFTGATE.
//!
//! These are the core types shared across all crates.

pub mod event;
pub mod quota;
pub mod schedule;
pub mod session;
