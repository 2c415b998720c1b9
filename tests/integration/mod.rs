//! Integration tests for tokio_relay
//!
//! Each test starts a real server in-process on an ephemeral port and talks
//! to it over HTTP with reqwest.
//!
//! Run with: cargo test --test integration

mod helpers;

mod chain;
mod http_basic;
mod negotiation;
mod streaming;
