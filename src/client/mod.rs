//! Client for the exam score REST API.

pub mod api;

#[cfg(test)]
pub mod test_support;

pub use api::{ApiClient, ApiError};
