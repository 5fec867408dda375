//! Provider transition tables.
//!
//! Each verified provider event is mapped here to a [`Transition`]: the
//! status to write, the entitlement projection to derive, and the payment
//! side effects to record. The two providers feed divergent inputs (PayPal
//! pushes typed webhook events; MercadoPago notifications are thin pointers
//! that trigger a fetch), but both reduce to this one vocabulary so the
//! reconciliation engine applies them identically.
//!
//! These functions are pure; the engine in
//! `application::handlers::billing::apply_transition` owns persistence.

use chrono::{DateTime, Months, Utc};

use super::entitlement::EntitlementChange;
use super::events::{
    MpPaymentSnapshot, PayPalEventKind, PayPalSaleDetails, PayPalSubscriptionDetails,
    PreapprovalSnapshot,
};
use super::payment::PaymentStatus;
use super::status::SubscriptionStatus;

/// Payment fields produced by a transition; the engine attaches the
/// subscription/company identity when persisting.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetails {
    pub provider_transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

/// What a verified provider event means for local records.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Overwrite the subscription status and project the entitlement.
    Status {
        new_status: SubscriptionStatus,
        /// Literal provider status, stored for operator inspection.
        provider_status: String,
        entitlement: EntitlementChange,
        next_billing_time: Option<DateTime<Utc>>,
        payer_email: Option<String>,
    },

    /// PayPal payment-failure notice: increment the counter, status unchanged.
    PaymentFailedTick,

    /// Record (upsert) a payment transaction, with optional side effects.
    RecordPayment {
        payment: PaymentDetails,
        /// MercadoPago approved path: sync this renewal date onto the company.
        sync_renewal: Option<DateTime<Utc>>,
        /// MercadoPago rejected path: force subscription and entitlement to paused.
        force_pause: bool,
        /// PayPal sale-completed path: dispatch a receipt email.
        send_receipt: bool,
    },

    /// Mark the matching payment transaction refunded.
    MarkRefunded { provider_transaction_id: String },

    /// Nothing to do; the reason is logged.
    Ignore { reason: String },
}

/// Maps a verified PayPal webhook event onto a transition.
///
/// `subscription` is present for `BILLING.SUBSCRIPTION.*` events and `sale`
/// for `PAYMENT.SALE.*` events; the ingress handler decodes whichever the
/// envelope's resource type carries.
pub fn map_paypal_event(
    kind: &PayPalEventKind,
    subscription: Option<&PayPalSubscriptionDetails>,
    sale: Option<&PayPalSaleDetails>,
) -> Transition {
    match kind {
        PayPalEventKind::SubscriptionActivated => match subscription {
            Some(details) => Transition::Status {
                new_status: SubscriptionStatus::Active,
                provider_status: details.status.clone().unwrap_or_else(|| "ACTIVE".to_string()),
                entitlement: EntitlementChange::activate_keeping_plan(details.next_billing_time),
                next_billing_time: details.next_billing_time,
                payer_email: details.payer_email.clone(),
            },
            None => missing_resource("subscription"),
        },
        PayPalEventKind::SubscriptionCancelled => match subscription {
            Some(details) => Transition::Status {
                new_status: SubscriptionStatus::Cancelled,
                provider_status: details
                    .status
                    .clone()
                    .unwrap_or_else(|| "CANCELLED".to_string()),
                entitlement: EntitlementChange::cancel(),
                next_billing_time: None,
                payer_email: details.payer_email.clone(),
            },
            None => missing_resource("subscription"),
        },
        PayPalEventKind::SubscriptionSuspended => match subscription {
            Some(details) => Transition::Status {
                new_status: SubscriptionStatus::Paused,
                provider_status: details
                    .status
                    .clone()
                    .unwrap_or_else(|| "SUSPENDED".to_string()),
                // PayPal suspension revokes access immediately, unlike the
                // MercadoPago paused path.
                entitlement: EntitlementChange::pause_revoking_access(),
                next_billing_time: None,
                payer_email: details.payer_email.clone(),
            },
            None => missing_resource("subscription"),
        },
        PayPalEventKind::SubscriptionExpired => match subscription {
            Some(details) => Transition::Status {
                new_status: SubscriptionStatus::Expired,
                provider_status: details
                    .status
                    .clone()
                    .unwrap_or_else(|| "EXPIRED".to_string()),
                entitlement: EntitlementChange::expire(),
                next_billing_time: None,
                payer_email: details.payer_email.clone(),
            },
            None => missing_resource("subscription"),
        },
        PayPalEventKind::SubscriptionPaymentFailed => Transition::PaymentFailedTick,
        PayPalEventKind::SaleCompleted => match sale {
            Some(details) => Transition::RecordPayment {
                payment: PaymentDetails {
                    provider_transaction_id: details.transaction_id.clone(),
                    amount: details.amount,
                    currency: details.currency.clone(),
                    status: PaymentStatus::Completed,
                    paid_at: details.paid_at,
                    raw: details.raw.clone(),
                },
                sync_renewal: None,
                force_pause: false,
                send_receipt: true,
            },
            None => missing_resource("sale"),
        },
        PayPalEventKind::SaleRefunded => match sale {
            Some(details) => Transition::MarkRefunded {
                provider_transaction_id: details.transaction_id.clone(),
            },
            None => missing_resource("sale"),
        },
        PayPalEventKind::Unknown(event_type) => Transition::Ignore {
            reason: format!("unhandled PayPal event type: {}", event_type),
        },
    }
}

/// Maps a fetched MercadoPago preapproval onto a transition.
///
/// The subscription status records the provider's literal string; the
/// entitlement branches on the four documented statuses.
pub fn map_mp_preapproval(snapshot: &PreapprovalSnapshot) -> Transition {
    let entitlement = match snapshot.status.as_str() {
        "authorized" => EntitlementChange::activate_keeping_plan(snapshot.next_payment_date),
        "cancelled" => EntitlementChange::cancel(),
        "expired" => EntitlementChange::expire(),
        // Deliberately retains temporary access: is_subscribed untouched.
        "paused" => EntitlementChange::pause_retaining_access(),
        "pending" => EntitlementChange::pending(None),
        other => {
            return Transition::Ignore {
                reason: format!("unhandled preapproval status: {}", other),
            }
        }
    };

    let new_status = match snapshot.status.as_str() {
        "authorized" => SubscriptionStatus::Active,
        "cancelled" => SubscriptionStatus::Cancelled,
        "expired" => SubscriptionStatus::Expired,
        "paused" => SubscriptionStatus::Paused,
        "pending" => SubscriptionStatus::Pending,
        _ => unreachable!("filtered above"),
    };

    Transition::Status {
        new_status,
        provider_status: snapshot.status.clone(),
        entitlement,
        next_billing_time: snapshot.next_payment_date,
        payer_email: snapshot.payer_email.clone(),
    }
}

/// Maps a fetched MercadoPago payment onto a transition.
///
/// Approved payments sync the renewal date onto the company; rejected
/// payments force the subscription (and entitlement) to paused. Everything
/// else is recorded verbatim with no further effect.
pub fn map_mp_payment(snapshot: &MpPaymentSnapshot) -> Transition {
    let status = PaymentStatus::from_provider(&snapshot.status);
    let approved = status == PaymentStatus::Approved;
    let rejected = status == PaymentStatus::Rejected;

    // Approved charges push the next billing date one month out from the
    // capture time; MercadoPago does not echo it on the payment object.
    let sync_renewal = if approved {
        snapshot
            .paid_at
            .unwrap_or_else(Utc::now)
            .checked_add_months(Months::new(1))
    } else {
        None
    };

    Transition::RecordPayment {
        payment: PaymentDetails {
            provider_transaction_id: snapshot.id.clone(),
            amount: snapshot.amount,
            currency: snapshot.currency.clone(),
            status,
            paid_at: snapshot.paid_at,
            raw: snapshot.raw.clone(),
        },
        sync_renewal,
        force_pause: rejected,
        send_receipt: approved,
    }
}

fn missing_resource(expected: &str) -> Transition {
    Transition::Ignore {
        reason: format!("event resource missing expected {} payload", expected),
    }
}
