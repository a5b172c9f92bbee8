//! Log query tools over a paginated log provider.
//!
//! Queries return short, redacted summaries; every record seen is kept in a
//! bounded TTL cache so detail lookups rarely go back to the provider.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod mcp;
pub mod model;
pub mod path;
pub mod provider;
pub mod query;
pub mod redact;
pub mod service;
pub mod summary;
pub mod timestamp;
