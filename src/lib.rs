//! Client-side IRC protocol engine.
//!
//! [`irc`] handles the wire: framing, parsing and the transport driver.
//! [`client`] tracks the connection, users and channels, and reports changes
//! as [`client::ClientEvent`]s. [`flood`] paces outbound traffic.

pub mod client;
pub mod config;
pub mod error;
pub mod flood;
pub mod irc;
pub mod logging;

pub use client::{Client, ClientEvent};
pub use config::ClientConfig;
pub use error::ClientError;
