//! Remote trading API access.
//!
//! [`TradingClient`] attaches the three signature headers produced by a
//! [`crate::auth::RequestSigner`] to every portfolio call.

mod client;
pub mod endpoints;
mod types;

pub use client::{TradingClient, TradingClientBuilder};
pub use types::{Balance, PageRequest};
