//! Canopy - carbon-credit marketplace backend
//!
//! Farmers list carbon credits, industries buy them, regulators verify users.
//!
//! ## Services
//!
//! - **Credits**: listing, atomic purchase, sustainability scoring
//! - **Auth**: JWT access/refresh tokens, argon2 password hashing, role allow-lists
//! - **Cache**: in-process TTL cache for listings, stats, and profiles
//! - **Gamification**: achievements and leaderboard, mirrored to a simulated ledger
//! - **Reports**: per-user marketplace snapshots
//! - **Activity log**: append-only audit trail in MongoDB

pub mod auth;
pub mod cache;
pub mod config;
pub mod credits;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CanopyError, Result};
