//! Marketplace roles and allow-list authorization
//!
//! Unlike a linear permission ladder, marketplace roles are peers with
//! disjoint capabilities: farmers list credits, industries buy them,
//! regulators verify and administer users. Authorization is therefore an
//! allow-list check per operation, not an ordering comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace role attached to every user and token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Lists credits for sale
    #[default]
    Farmer,
    /// Purchases listed credits
    Industry,
    /// Verifies users and administers site settings
    Regulator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Farmer => write!(f, "farmer"),
            Role::Industry => write!(f, "industry"),
            Role::Regulator => write!(f, "regulator"),
        }
    }
}

impl Role {
    /// Parse a role from its wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "farmer" => Some(Role::Farmer),
            "industry" => Some(Role::Industry),
            "regulator" => Some(Role::Regulator),
            _ => None,
        }
    }

    /// Check membership in an operation's allow-list
    pub fn is_allowed(&self, allowed: &[Role]) -> bool {
        allowed.contains(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for role in [Role::Farmer, Role::Industry, Role::Regulator] {
            assert_eq!(Role::parse(&role.to_string()), Some(role));
        }
        assert_eq!(Role::parse("FARMER"), Some(Role::Farmer));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_serde_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Industry).unwrap(), "\"industry\"");
        let parsed: Role = serde_json::from_str("\"regulator\"").unwrap();
        assert_eq!(parsed, Role::Regulator);
    }

    #[test]
    fn test_allow_list() {
        assert!(Role::Farmer.is_allowed(&[Role::Farmer]));
        assert!(!Role::Industry.is_allowed(&[Role::Farmer]));
        assert!(Role::Regulator.is_allowed(&[Role::Farmer, Role::Regulator]));
        assert!(!Role::Regulator.is_allowed(&[]));
    }
}
