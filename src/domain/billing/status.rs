//! Subscription status state machine.
//!
//! Defines the lifecycle states a subscription moves through and the
//! nominal transitions between them. Webhook deliveries are not guaranteed
//! to arrive in order, so the reconciliation engine overwrites status
//! last-writer-wins; this machine documents the expected lifecycle and lets
//! the engine flag out-of-band jumps.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a subscription, for both providers uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout initiated, provider record created, no confirmation yet.
    Pending,

    /// PayPal only: subscription created, awaiting the buyer's approval step.
    ApprovalPending,

    /// Billing is live; the company is entitled to the product.
    Active,

    /// Provider paused/suspended billing (payment rejection or user action).
    Paused,

    /// Terminal: cancelled by the user or the provider.
    Cancelled,

    /// Terminal: provider gave up (e.g. final payment retry exhausted).
    Expired,
}

impl SubscriptionStatus {
    /// Wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::ApprovalPending => "approval_pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "approval_pending" => Some(SubscriptionStatus::ApprovalPending),
            "active" => Some(SubscriptionStatus::Active),
            "paused" => Some(SubscriptionStatus::Paused),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, ApprovalPending)
                | (Pending, Active)
                | (Pending, Cancelled)
                | (Pending, Expired)
            // From APPROVAL_PENDING
                | (ApprovalPending, Active)
                | (ApprovalPending, Cancelled)
                | (ApprovalPending, Expired)
            // From ACTIVE
                | (Active, Paused)
                | (Active, Cancelled)
                | (Active, Expired)
                | (Active, Active) // renewal / re-sync
            // From PAUSED: reactivate or cancel only
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![ApprovalPending, Active, Cancelled, Expired],
            ApprovalPending => vec![Active, Cancelled, Expired],
            Active => vec![Paused, Cancelled, Expired, Active],
            Paused => vec![Active, Cancelled],
            Cancelled => vec![],
            Expired => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_reach_active_directly() {
        // MercadoPago card-token flow activates synchronously.
        assert!(SubscriptionStatus::Pending.can_transition_to(&SubscriptionStatus::Active));
    }

    #[test]
    fn pending_can_reach_approval_pending() {
        assert!(
            SubscriptionStatus::Pending.can_transition_to(&SubscriptionStatus::ApprovalPending)
        );
    }

    #[test]
    fn active_can_pause_cancel_or_expire() {
        let active = SubscriptionStatus::Active;
        assert!(active.can_transition_to(&SubscriptionStatus::Paused));
        assert!(active.can_transition_to(&SubscriptionStatus::Cancelled));
        assert!(active.can_transition_to(&SubscriptionStatus::Expired));
    }

    #[test]
    fn paused_can_only_reactivate_or_cancel() {
        let paused = SubscriptionStatus::Paused;
        assert!(paused.can_transition_to(&SubscriptionStatus::Active));
        assert!(paused.can_transition_to(&SubscriptionStatus::Cancelled));
        assert!(!paused.can_transition_to(&SubscriptionStatus::Expired));
        assert!(!paused.can_transition_to(&SubscriptionStatus::Pending));
    }

    #[test]
    fn cancelled_and_expired_are_terminal() {
        assert!(SubscriptionStatus::Cancelled.is_terminal());
        assert!(SubscriptionStatus::Expired.is_terminal());
    }

    #[test]
    fn active_renewal_is_allowed() {
        let result = SubscriptionStatus::Active.transition_to(SubscriptionStatus::Active);
        assert_eq!(result, Ok(SubscriptionStatus::Active));
    }

    #[test]
    fn storage_representation_roundtrips() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::ApprovalPending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Paused,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            assert_eq!(SubscriptionStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert_eq!(SubscriptionStatus::parse("suspended-ish"), None);
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::ApprovalPending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Paused,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            for target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&target),
                    "{:?} -> {:?} should be valid",
                    status,
                    target
                );
            }
        }
    }
}
