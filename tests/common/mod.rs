//! Integration test common infrastructure.
//!
//! Provides a fully wired in-process relay core over an in-memory store,
//! plus record builders for the tag shapes the pipelines consume.

pub mod relay;

#[allow(unused_imports)]
pub use relay::{declaration, drain, record, TestRelay};
