//! # exlink
//!
//! Safe client over the native exchange-connectivity engine, providing:
//!
//! - **Client** (`client`) — connection handles and every exchange operation
//! - **Types** (`types`) — public value types and wire-record decoding
//! - **Configuration** (`config`) — venue credentials, JSON deserialization
//! - **Error types** (`error`) — the engine's tagged results as `ExchangeError`
//! - **Buffers** (`buffer`) — the caller-allocated bulk-fetch protocol
//! - **Streaming** (`stream`) — subscription registry and push dispatch
//! - **Text** (`text`) — ownership bridge for engine-allocated strings
//! - **Lifecycle** (`sync`) — the disconnect gate
//! - **Logging** (`logging`) — tracing-based structured logging
//!
//! The raw ABI lives in the companion `exlink-sys` crate; everything here
//! upholds its ownership and buffer contracts so callers never touch a
//! raw pointer.

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod stream;
pub(crate) mod sync;
pub(crate) mod text;
pub mod types;

#[cfg(test)]
pub(crate) mod stub_engine;

pub use buffer::Page;
pub use client::ExchangeClient;
pub use config::{AppConfig, BinanceConfig, Environment, NashConfig};
pub use error::ExchangeError;
pub use stream::SubscriptionToken;
pub use types::*;
