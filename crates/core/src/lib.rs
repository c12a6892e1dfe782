//! `brewpost-core`: domain model of the content studio.
//!
//! Pure logic only: the fake progress curve, photo intake checks, copy
//! candidates, generator capability traits, and the workflow reducer.
//! Timers and network calls live in `brewpost-studio` and
//! `brewpost-client`.

pub mod copy;
pub mod error;
pub mod generator;
pub mod progress;
pub mod types;
pub mod upload;
pub mod workflow;
