//! Integration test utilities for the support gateway
//!
//! This crate provides helpers for running end-to-end tests against the WebSocket gateway.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
