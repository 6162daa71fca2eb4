//! Credit domain logic
//!
//! [`scoring`] derives the immutable sustainability-metrics snapshot;
//! [`lifecycle`] owns the Available -> Sold state machine and the documents
//! for the atomic purchase update.

pub mod lifecycle;
pub mod scoring;

pub use lifecycle::{
    can_purchase, holds_sold_invariant, purchase_filter, purchase_update, Coordinates,
    CreditStatus, Location, NewCredit, TradeRecord, VerificationDetails,
};
pub use scoring::{compute_metrics, CreditType, SustainabilityMetrics};
