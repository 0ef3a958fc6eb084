//! petcry: animal cry classification
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                HTTP API (axum) / CLI (clap)                 │
//! │        POST /v1/predict, GET /v1/labels, GET /health        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CryEngine (tokio)                       │
//! │          bounded workers, queue, per-request timeout        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CryPipeline                          │
//! │   decode → log-mel → tensor → ONNX → labels → ranking       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod report;
pub mod server;

pub use petcry_core as core;
pub use petcry_neural as neural;
