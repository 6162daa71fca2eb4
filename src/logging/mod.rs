//! Logging infrastructure for Canopy
//!
//! Structured request logging goes through `tracing`; audit events
//! additionally persist to MongoDB via [`activity::ActivityLogger`].

pub mod activity;

pub use activity::ActivityLogger;
