//! HTTP surface of the relay.

pub mod routes;
pub mod state;
