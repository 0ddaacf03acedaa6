//! Edge Reconciler Library
//!
//! Deploys device workloads through pluggable deployers and keeps watching
//! their components so the live status of every workload stays queryable.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod models;
pub mod monitor;
pub mod registry;
pub mod server;
pub mod storage;
pub mod utils;
pub mod watcher;
pub mod workers;
