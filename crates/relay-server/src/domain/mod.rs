//! Domain layer for relay-server.
//!
//! Only configuration lives here.  Reading it from disk or the command line is
//! left to the infrastructure layer and `main.rs`.

pub mod config;

pub use config::ServerConfig;
