//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop
//! - One worker thread per connection, capped at `max_connections`
//! - Requests routed through [`crate::service::Service`]

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
