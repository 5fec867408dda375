//! Billing domain: subscriptions, entitlements, payments, and the provider
//! transition tables that keep them consistent.

mod company;
mod entitlement;
mod errors;
mod events;
mod payment;
mod plan;
mod status;
mod subscription;
mod transition;
mod webhook_verifier;

pub use company::Company;
pub use entitlement::{CompanyEntitlement, EntitlementChange, EntitlementStatus};
pub use errors::WebhookError;
pub use events::{
    MpNotification, MpPaymentSnapshot, PayPalEventKind, PayPalSaleDetails,
    PayPalSubscriptionDetails, PayPalWebhookEnvelope, PreapprovalSnapshot,
};
pub use payment::{PaymentStatus, PaymentTransaction};
pub use plan::{Plan, PlanKey};
pub use status::SubscriptionStatus;
pub use subscription::{Provider, Subscription};
pub use transition::{
    map_mp_payment, map_mp_preapproval, map_paypal_event, PaymentDetails, Transition,
};
pub use webhook_verifier::{build_manifest, MpSignatureVerifier, SignatureHeader};

#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
