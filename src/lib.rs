#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod status;
pub mod transport;

pub use client::Client;
pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectionState, Snapshot};
pub use dispatch::Callbacks;
pub use heartbeat::HeartbeatState;
pub use message::{HEARTBEAT, InboundMessage};
pub use status::{Liveness, StatusRecord};

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
