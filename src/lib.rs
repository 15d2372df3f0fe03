//! C Function Flowchart Generator
//!
//! This library provides the job lifecycle engine behind the flowchart
//! service: an in-memory job registry, a single-consumer work queue, the
//! worker that drives each job through generation and validation, and the
//! notification hub that pushes job snapshots to subscribers.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
