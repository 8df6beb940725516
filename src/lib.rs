//! Attribute-join and choropleth aggregation engine.
//!
//! Joins a long-format attribute table (region, category, measure) to a
//! polygon dataset keyed by the same region code, aggregates measures over a
//! selected category subset, and derives per-region color bindings plus
//! on-demand breakdown tables. Loading, export, and the HTTP API live in
//! their own modules; the engine itself never touches the filesystem.

pub mod aggregate;
pub mod binding;
pub mod breakdown;
pub mod color;
pub mod config;
pub mod data;
pub mod export;
pub mod index;
pub mod server;
pub mod session;
pub mod types;
