//! pbview View Service - Role assignment for primary/backup replication
//!
//! This crate provides the view service and its transport:
//!
//! - `failure`: tick-based liveness countdowns for the primary and backup
//! - `idle`: pool of servers waiting to be promoted to backup
//! - `state`: the acknowledgment-gated view state machine
//! - `service`: lock-guarded service and the periodic tick driver
//! - `http`: axum endpoint and server lifecycle
//! - `client`: reqwest client for replicas and clients

pub mod client;
pub mod failure;
pub mod http;
pub mod idle;
pub mod service;
pub mod state;

pub use client::ViewClient;
pub use failure::{FailureDetector, Ttl};
pub use http::{router, start_server, start_with_service, PingArgs, ServerHandle, ViewReply};
pub use idle::{IdlePool, IdleServer, InsertionOrder, SelectionPolicy};
pub use service::ViewService;
pub use state::ViewState;
