//! ---
//! ah_section: "01-core-functionality"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Shared primitives and utilities for the healing pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
//! Core shared primitives for the autoheal workspace.
//! This crate exposes configuration loading, tracing bootstrap, the shared
//! metrics registry and timestamp helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, DatasetConfig, DatasetKind, LogPaths, LoggingConfig, PolicyConfig, PolicyKind,
    SimulatorConfig, Thresholds,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{new_registry, render_text, SharedRegistry};
