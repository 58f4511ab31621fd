//! Checkout funnel analytics: authenticated warehouse queries, a TTL result
//! cache, and dropoff views derived from the cached tables.

pub mod api;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod query;
pub mod server;
pub mod storage;
pub mod views;
pub mod warehouse;
