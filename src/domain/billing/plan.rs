//! Subscription plans and the server-side price table.
//!
//! Prices are authoritative on the server. Client-submitted amounts are
//! logged for diagnostics but never trusted over this table.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Closed set of purchasable plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKey {
    Basic,
    Standard,
    Premium,
}

impl PlanKey {
    /// Parses a plan key from its wire representation.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(PlanKey::Basic),
            "standard" => Ok(PlanKey::Standard),
            "premium" => Ok(PlanKey::Premium),
            other => Err(DomainError::new(
                ErrorCode::InvalidPlan,
                format!("Plan desconocido: {}", other),
            )
            .with_detail("planKey", other)),
        }
    }

    /// Wire representation of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKey::Basic => "basic",
            PlanKey::Standard => "standard",
            PlanKey::Premium => "premium",
        }
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchasable plan with its server-trusted monthly price.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub key: PlanKey,
    /// Display name shown on invoices and emails.
    pub name: &'static str,
    /// Monthly amount in `currency` units.
    pub monthly_amount: f64,
    /// ISO currency code.
    pub currency: &'static str,
}

static PRICE_TABLE: Lazy<Vec<Plan>> = Lazy::new(|| {
    vec![
        Plan {
            key: PlanKey::Basic,
            name: "Plan Básico",
            monthly_amount: 14_999.0,
            currency: "ARS",
        },
        Plan {
            key: PlanKey::Standard,
            name: "Plan Estándar",
            monthly_amount: 29_999.0,
            currency: "ARS",
        },
        Plan {
            key: PlanKey::Premium,
            name: "Plan Premium",
            monthly_amount: 49_999.0,
            currency: "ARS",
        },
    ]
});

impl Plan {
    /// Looks up a plan by key in the server price table.
    pub fn for_key(key: PlanKey) -> &'static Plan {
        PRICE_TABLE
            .iter()
            .find(|p| p.key == key)
            .expect("price table covers every PlanKey")
    }

    /// The full server price table.
    pub fn all() -> &'static [Plan] {
        &PRICE_TABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_all_known_keys() {
        assert_eq!(PlanKey::parse("basic").unwrap(), PlanKey::Basic);
        assert_eq!(PlanKey::parse("standard").unwrap(), PlanKey::Standard);
        assert_eq!(PlanKey::parse("premium").unwrap(), PlanKey::Premium);
        assert_eq!(PlanKey::parse("PREMIUM").unwrap(), PlanKey::Premium);
    }

    #[test]
    fn parse_rejects_unknown_key() {
        let err = PlanKey::parse("enterprise").unwrap_err();
        assert_eq!(err.code, crate::domain::foundation::ErrorCode::InvalidPlan);
        assert_eq!(err.details.get("planKey"), Some(&"enterprise".to_string()));
    }

    #[test]
    fn price_table_covers_every_key() {
        for key in [PlanKey::Basic, PlanKey::Standard, PlanKey::Premium] {
            let plan = Plan::for_key(key);
            assert_eq!(plan.key, key);
            assert!(plan.monthly_amount > 0.0);
            assert_eq!(plan.currency, "ARS");
        }
    }

    #[test]
    fn prices_are_strictly_increasing_by_tier() {
        let basic = Plan::for_key(PlanKey::Basic).monthly_amount;
        let standard = Plan::for_key(PlanKey::Standard).monthly_amount;
        let premium = Plan::for_key(PlanKey::Premium).monthly_amount;
        assert!(basic < standard && standard < premium);
    }

    #[test]
    fn key_roundtrips_through_string() {
        for key in [PlanKey::Basic, PlanKey::Standard, PlanKey::Premium] {
            assert_eq!(PlanKey::parse(key.as_str()).unwrap(), key);
        }
    }
}
