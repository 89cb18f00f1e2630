// src/drape/mod.rs

pub mod assets;
pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod gallery;
pub mod generation;
pub mod http_client_pool;
pub mod image_ref;
pub mod orchestrator;
pub mod pipeline;
pub mod preview;
#[cfg(feature = "server")]
pub mod server;
pub mod style_code;
pub mod upload_relay;
pub mod validation;

pub use orchestrator::Studio;
pub use pipeline::TryOnPipeline;
