//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the SSE endpoint.
//! The broker itself (Manager, ConnectionRegistry, message types) lives in
//! the `sse` crate so that producers can depend on it without the web layer.

pub mod handler;
