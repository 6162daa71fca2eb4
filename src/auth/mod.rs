//! Authentication and authorization for Canopy
//!
//! Provides:
//! - JWT token generation and validation
//! - Marketplace roles with allow-list authorization
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;
pub mod roles;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{hash_password, verify_password};
pub use roles::Role;
