#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Terminal session and process orchestration core.
//!
//! Layers follow the dependency rule `app -> adapters -> usecases -> domain`,
//! with `infra` implementing the use-case ports.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infra;
pub mod usecases;

pub use app::Application;
