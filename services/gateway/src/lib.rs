//! Gateway service library crate.
//!
//! # Purpose
//! Exposes the HTTP API surface, configuration and observability wiring for
//! use by the binary and tests.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
