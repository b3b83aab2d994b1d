//! GitHub public activity ingestion: validated events behind a revalidating cache,
//! projected into RSS and Atom feeds.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
