//! HTTP layer: the axum router exposing project structure outlines, the
//! public-repository check, health, and metrics.

pub mod handler;
