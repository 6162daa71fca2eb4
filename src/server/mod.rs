//! HTTP server for Canopy

pub mod http;

pub use http::{run, AppState};
