//! 거래소 REST 커넥터.

pub mod bitfinex;

pub use bitfinex::{BitfinexClient, BitfinexConfig};
