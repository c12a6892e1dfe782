//! `brewpost-studio` library crate.
//!
//! Runtime glue around the workflow reducer: environment configuration,
//! tokio-driven progress timers, and the [`controller::ContentController`].
//! The driver binary lives in `main.rs`.

pub mod config;
pub mod controller;
pub mod timer;
