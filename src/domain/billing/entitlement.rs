//! Company entitlement projection.
//!
//! The entitlement is a denormalized view on the company record that gates
//! feature access in the rest of the application. It is never written
//! directly: every field is derived from subscription state transitions by
//! the reconciliation engine, which keeps the projection a pure function of
//! the most recent applied transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::PlanKey;

/// UI-facing entitlement status, a simplified vocabulary distinct from
/// [`super::SubscriptionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Active,
    Paused,
    Canceled,
    Expired,
    Pending,
}

impl EntitlementStatus {
    /// Wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::Paused => "paused",
            EntitlementStatus::Canceled => "canceled",
            EntitlementStatus::Expired => "expired",
            EntitlementStatus::Pending => "pending",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EntitlementStatus::Active),
            "paused" => Some(EntitlementStatus::Paused),
            "canceled" => Some(EntitlementStatus::Canceled),
            "expired" => Some(EntitlementStatus::Expired),
            "pending" => Some(EntitlementStatus::Pending),
            _ => None,
        }
    }
}

/// Denormalized entitlement fields on the company record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyEntitlement {
    /// Boolean gate for feature access.
    pub is_subscribed: bool,

    /// Simplified status for display.
    pub status: EntitlementStatus,

    /// Plan key mirrored from the active subscription.
    pub selected_plan: Option<PlanKey>,

    /// Next billing date, for display.
    pub renewal_date: Option<DateTime<Utc>>,
}

impl CompanyEntitlement {
    /// Entitlement for a company with no subscription history.
    pub fn none() -> Self {
        Self {
            is_subscribed: false,
            status: EntitlementStatus::Pending,
            selected_plan: None,
            renewal_date: None,
        }
    }
}

/// A partial update to the entitlement, produced by the transition tables.
///
/// `None` fields are left untouched on the company record. This is how the
/// MercadoPago `paused` path keeps `is_subscribed` as-is while PayPal's
/// suspended path clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementChange {
    pub status: EntitlementStatus,
    pub is_subscribed: Option<bool>,
    pub selected_plan: Option<PlanKey>,
    /// `Some(None)` clears the renewal date; `None` leaves it untouched.
    pub renewal_date: Option<Option<DateTime<Utc>>>,
}

impl EntitlementChange {
    /// Full activation: subscribed, plan and renewal date synced.
    pub fn activate(plan: PlanKey, renewal: Option<DateTime<Utc>>) -> Self {
        Self {
            status: EntitlementStatus::Active,
            is_subscribed: Some(true),
            selected_plan: Some(plan),
            renewal_date: Some(renewal),
        }
    }

    /// Activation that keeps the currently selected plan.
    pub fn activate_keeping_plan(renewal: Option<DateTime<Utc>>) -> Self {
        Self {
            status: EntitlementStatus::Active,
            is_subscribed: Some(true),
            selected_plan: None,
            renewal_date: Some(renewal),
        }
    }

    /// Cancellation: access revoked.
    pub fn cancel() -> Self {
        Self {
            status: EntitlementStatus::Canceled,
            is_subscribed: Some(false),
            selected_plan: None,
            renewal_date: Some(None),
        }
    }

    /// Expiry: access revoked.
    pub fn expire() -> Self {
        Self {
            status: EntitlementStatus::Expired,
            is_subscribed: Some(false),
            selected_plan: None,
            renewal_date: Some(None),
        }
    }

    /// Pause that revokes access (PayPal suspended path).
    pub fn pause_revoking_access() -> Self {
        Self {
            status: EntitlementStatus::Paused,
            is_subscribed: Some(false),
            selected_plan: None,
            renewal_date: None,
        }
    }

    /// Pause that retains temporary access (MercadoPago paused path).
    pub fn pause_retaining_access() -> Self {
        Self {
            status: EntitlementStatus::Paused,
            is_subscribed: None,
            selected_plan: None,
            renewal_date: None,
        }
    }

    /// Pending: a new checkout or plan change awaits confirmation.
    pub fn pending(plan: Option<PlanKey>) -> Self {
        Self {
            status: EntitlementStatus::Pending,
            is_subscribed: None,
            selected_plan: plan,
            renewal_date: None,
        }
    }

    /// Applies this change to an existing entitlement, producing the new
    /// projection. Pure; persistence happens in the engine.
    pub fn apply_to(&self, current: &CompanyEntitlement) -> CompanyEntitlement {
        CompanyEntitlement {
            is_subscribed: self.is_subscribed.unwrap_or(current.is_subscribed),
            status: self.status,
            selected_plan: self.selected_plan.or(current.selected_plan),
            renewal_date: match self.renewal_date {
                Some(value) => value,
                None => current.renewal_date,
            },
        }
    }
}
