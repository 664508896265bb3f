//! Analysis modules.
//!
//! Pure reductions over score records; no I/O.

pub mod aggregator;

pub use aggregator::*;
