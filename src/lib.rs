//! storyline - clusters a stream of news articles into evolving topics
//!
//! This crate provides:
//! - Embedding-based topic assignment with near-duplicate merging and
//!   resurrection of recently stale topics
//! - Topic and article lifecycle: ranked trimming, retention, purge and the
//!   active/stale/archived state machine
//! - A significance engine that snapshots a topic's narrative when it
//!   changes enough
//! - CLI commands driving the three batch jobs over a SQLite document store

mod backend;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod discussion;
pub mod embed;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod locks;
pub mod models;
pub mod narrative;
pub mod pipeline;
pub mod rank;
pub mod ratelimit;
pub mod store;
pub mod tasks;
pub mod vector;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::Pipeline;
