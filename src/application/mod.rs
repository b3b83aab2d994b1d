//! Ingestion pipeline: conditional fetch, pagination, and feed projection.

pub mod error;
pub mod fetch;
pub mod pagination;
pub mod syndication;
pub mod upstream;
