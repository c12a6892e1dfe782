//! Outbound adapters for the content studio.
//!
//! - [`generation`]: HTTP client for the image-generation backend.
//! - [`renderer`]: offline variant renderer, a drop-in [`ImageGenerator`].
//! - [`copywriter`]: template-based [`CopyGenerator`].
//! - [`weather`]: forecast lookup for the dashboard.
//!
//! [`ImageGenerator`]: brewpost_core::generator::ImageGenerator
//! [`CopyGenerator`]: brewpost_core::generator::CopyGenerator

pub mod copywriter;
pub mod generation;
pub mod renderer;
pub mod weather;
