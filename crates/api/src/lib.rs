//! HTTP API: a thin adapter over the core service.

pub mod app;
