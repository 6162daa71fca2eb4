//! Credit lifecycle state machine
//!
//! A credit is created Available, is purchased exactly once (Available ->
//! Sold, owner set, trading history appended), and never transitions again.
//! There is no re-listing or retirement path.
//!
//! The purchase transition must survive concurrent buyers: the status check
//! and the write are a single conditional update (`purchase_filter` +
//! `purchase_update` passed to `find_one_and_update`), so of two simultaneous
//! purchases exactly one matches and the other observes a lost race.

use bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credits::scoring::{compute_metrics, CreditType};
use crate::db::schemas::CreditDoc;
use crate::types::CanopyError;

/// Credit listing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CreditStatus {
    #[default]
    Available,
    Sold,
    Pending,
}

impl CreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Available => "Available",
            CreditStatus::Sold => "Sold",
            CreditStatus::Pending => "Pending",
        }
    }

    /// Parse a status from its wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(CreditStatus::Available),
            "Sold" => Some(CreditStatus::Sold),
            "Pending" => Some(CreditStatus::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geographic location of the underlying project
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Location {
    pub state: String,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One entry in a credit's append-only trading history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: DateTime,
    pub price: f64,
    pub buyer: ObjectId,
    pub seller: ObjectId,
}

/// Third-party verification details attached to a credit
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerificationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_date: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Validated input for creating a new credit listing
#[derive(Debug, Clone)]
pub struct NewCredit {
    pub credit_type: CreditType,
    pub amount: f64,
    pub price: f64,
    pub location: Location,
}

impl NewCredit {
    /// Validate raw listing input. Field-level messages surface as
    /// 400 responses at the route boundary.
    pub fn validate(
        credit_type: CreditType,
        amount: f64,
        price: f64,
        location: Location,
    ) -> Result<Self, CanopyError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CanopyError::Validation(
                "amount must be a positive number".into(),
            ));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(CanopyError::Validation(
                "price must be a positive number".into(),
            ));
        }
        if location.state.trim().is_empty() {
            return Err(CanopyError::Validation("location.state is required".into()));
        }
        if location.district.trim().is_empty() {
            return Err(CanopyError::Validation(
                "location.district is required".into(),
            ));
        }

        Ok(Self {
            credit_type,
            amount,
            price,
            location,
        })
    }

    /// Build the credit document: status Available, metrics snapshot attached.
    pub fn into_doc(self, farmer: ObjectId) -> CreditDoc {
        let metrics = compute_metrics(self.credit_type, self.amount);
        CreditDoc::new(
            farmer,
            self.credit_type,
            self.amount,
            self.price,
            self.location,
            metrics,
        )
    }
}

/// Check purchase preconditions against an already-loaded credit.
///
/// This gives buyers precise errors; the conditional update built by
/// [`purchase_filter`] remains the authority under concurrency.
pub fn can_purchase(credit: &CreditDoc, buyer: ObjectId) -> Result<(), CanopyError> {
    if credit.farmer == buyer {
        return Err(CanopyError::InvalidState(
            "Cannot purchase your own credit listing".into(),
        ));
    }
    if credit.status != CreditStatus::Available {
        return Err(CanopyError::InvalidState(
            "Credit is not available for purchase".into(),
        ));
    }
    Ok(())
}

/// Filter for the atomic purchase update: matches only while the credit is
/// still Available, making the status check part of the write.
pub fn purchase_filter(credit_id: ObjectId) -> Document {
    doc! {
        "_id": credit_id,
        "status": CreditStatus::Available.as_str(),
    }
}

/// Update for the atomic purchase: flips status, records the new owner, and
/// appends the trade to the history ledger in the same operation.
pub fn purchase_update(buyer: ObjectId, seller: ObjectId, price: f64) -> Document {
    doc! {
        "$set": {
            "status": CreditStatus::Sold.as_str(),
            "owner": buyer,
        },
        "$push": {
            "trading_history": {
                "date": DateTime::now(),
                "price": price,
                "buyer": buyer,
                "seller": seller,
            }
        }
    }
}

/// The sold-credit invariant: a Sold credit has an owner and its trailing
/// trade records buyer == owner, seller == farmer.
pub fn holds_sold_invariant(credit: &CreditDoc) -> bool {
    if credit.status != CreditStatus::Sold {
        return true;
    }
    match (credit.owner, credit.trading_history.last()) {
        (Some(owner), Some(last)) => last.buyer == owner && last.seller == credit.farmer,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_location() -> Location {
        Location {
            state: "Punjab".into(),
            district: "Ludhiana".into(),
            coordinates: Some(Coordinates {
                latitude: 30.9,
                longitude: 75.85,
            }),
        }
    }

    fn sample_credit(farmer: ObjectId) -> CreditDoc {
        NewCredit::validate(CreditType::SoilCarbon, 100.0, 10.0, sample_location())
            .unwrap()
            .into_doc(farmer)
    }

    #[test]
    fn test_new_credit_starts_available_with_metrics() {
        let farmer = ObjectId::new();
        let credit = sample_credit(farmer);

        assert_eq!(credit.status, CreditStatus::Available);
        assert_eq!(credit.farmer, farmer);
        assert!(credit.owner.is_none());
        assert!(credit.trading_history.is_empty());
        // Metrics snapshot per the scoring table
        assert_eq!(credit.sustainability_metrics.carbon_reduction, 50.0);
        assert_eq!(credit.sustainability_metrics.soil_health, 90.0);
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let loc = sample_location();
        assert!(NewCredit::validate(CreditType::SoilCarbon, 0.0, 10.0, loc.clone()).is_err());
        assert!(NewCredit::validate(CreditType::SoilCarbon, -5.0, 10.0, loc.clone()).is_err());
        assert!(NewCredit::validate(CreditType::SoilCarbon, 100.0, 0.0, loc.clone()).is_err());
        assert!(
            NewCredit::validate(CreditType::SoilCarbon, f64::NAN, 10.0, loc.clone()).is_err()
        );

        let mut no_state = sample_location();
        no_state.state = "  ".into();
        assert!(NewCredit::validate(CreditType::SoilCarbon, 100.0, 10.0, no_state).is_err());

        let mut no_district = sample_location();
        no_district.district = String::new();
        assert!(NewCredit::validate(CreditType::SoilCarbon, 100.0, 10.0, no_district).is_err());
    }

    #[test]
    fn test_can_purchase_guards() {
        let farmer = ObjectId::new();
        let buyer = ObjectId::new();
        let mut credit = sample_credit(farmer);

        assert!(can_purchase(&credit, buyer).is_ok());

        // Sellers cannot buy their own listing
        let err = can_purchase(&credit, farmer).unwrap_err();
        assert!(matches!(err, CanopyError::InvalidState(_)));

        // Sold credits are no longer purchasable
        credit.status = CreditStatus::Sold;
        let err = can_purchase(&credit, buyer).unwrap_err();
        assert_eq!(err.to_string(), "Credit is not available for purchase");
    }

    #[test]
    fn test_purchase_filter_matches_only_available() {
        let id = ObjectId::new();
        let filter = purchase_filter(id);
        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        assert_eq!(filter.get_str("status").unwrap(), "Available");
    }

    #[test]
    fn test_purchase_update_flips_status_and_appends_trade() {
        let buyer = ObjectId::new();
        let seller = ObjectId::new();
        let update = purchase_update(buyer, seller, 12.5);

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "Sold");
        assert_eq!(set.get_object_id("owner").unwrap(), buyer);

        let push = update.get_document("$push").unwrap();
        let trade = push.get_document("trading_history").unwrap();
        assert_eq!(trade.get_f64("price").unwrap(), 12.5);
        assert_eq!(trade.get_object_id("buyer").unwrap(), buyer);
        assert_eq!(trade.get_object_id("seller").unwrap(), seller);
    }

    #[test]
    fn test_sold_invariant() {
        let farmer = ObjectId::new();
        let buyer = ObjectId::new();
        let mut credit = sample_credit(farmer);

        // Available credit trivially holds
        assert!(holds_sold_invariant(&credit));

        // Sold without owner or history violates
        credit.status = CreditStatus::Sold;
        assert!(!holds_sold_invariant(&credit));

        // Proper purchase shape holds: buyer == owner, seller == farmer
        credit.owner = Some(buyer);
        credit.trading_history.push(TradeRecord {
            date: DateTime::now(),
            price: 10.0,
            buyer,
            seller: farmer,
        });
        assert!(holds_sold_invariant(&credit));

        // Mismatched seller violates
        credit.trading_history.last_mut().unwrap().seller = ObjectId::new();
        assert!(!holds_sold_invariant(&credit));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&CreditStatus::Available).unwrap(),
            "\"Available\""
        );
        assert_eq!(CreditStatus::parse("Sold"), Some(CreditStatus::Sold));
        assert_eq!(CreditStatus::parse("Retired"), None);
    }
}
