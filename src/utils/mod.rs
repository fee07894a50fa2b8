//! # Utility Modules
//!
//! Supporting utilities used throughout the session core.
//!
//! ## Components
//! - **Compression**: LZ4 and Zstd snapshot compression with output limits
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Timeout**: Async timeout wrappers and default durations

pub mod compression;
pub mod logging;
pub mod metrics;
pub mod timeout;
