//! A small authenticated item service built on axum.
//!
//! Callers authenticate with HTTP Basic credentials and are gated on their
//! `reader` and `writer` role claims. Items are stored in PostgreSQL or in
//! process-local tables, depending on configuration.

pub mod app;
pub mod feature;
pub mod infra;
