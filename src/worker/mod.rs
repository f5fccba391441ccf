// src/worker/mod.rs

//! Compile worker with request/response correlation.
//!
//! - `protocol`: wire messages (`callbackId`-tagged).
//! - `server`: the worker loop serving build and watch requests.
//! - `client`: id allocation and per-request response routing.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{BuildReport, WorkerClient};
pub use protocol::{WorkerRequest, WorkerResponse};
pub use server::{WatchSupport, WatcherFactory, spawn_worker};
