//! IRC wire protocol: line framing, message parsing, mode strings, numerics,
//! and the transport driver that connects them to a [`Client`](crate::client::Client).

pub mod casemap;
pub mod connection;
pub mod framer;
pub mod message;
pub mod mode;
pub mod numeric;
pub mod prefix;

pub use casemap::CaseMapping;
pub use framer::{LineCodec, LineFramer};
pub use message::Message;
pub use mode::{ModeChange, ModeKind};
pub use prefix::Prefix;
