//! Billing command handlers: webhook ingress for both providers, the
//! shared transition engine, subscription creation/management, plan-change
//! orchestration, and the daily reconciliation job.

mod activate_subscription;
mod apply_transition;
mod change_paypal_plan;
mod create_subscription;
mod get_subscription_status;
mod manage_company_subscription;
mod manage_subscription;
mod notifications;
mod process_mercadopago_webhook;
mod process_paypal_webhook;
mod reconcile_subscriptions;

#[cfg(test)]
pub(crate) mod test_support;

pub use activate_subscription::{
    ActivateSubscriptionCommand, ActivateSubscriptionHandler, ActivateSubscriptionResult,
};
pub use apply_transition::{SubscriptionStateMachine, TransitionReport};
pub use change_paypal_plan::{
    ChangePayPalPlanCommand, ChangePayPalPlanHandler, ChangePayPalPlanResult, PayPalCheckoutUrls,
};
pub use create_subscription::{
    CreateMpSubscriptionCommand, CreateMpSubscriptionHandler, CreateMpSubscriptionResult,
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
};
pub use get_subscription_status::{
    GetMpSubscriptionStatusCommand, GetMpSubscriptionStatusHandler, MpSubscriptionStatus,
};
pub use manage_company_subscription::{
    CompanyAction, ManageSubscriptionCommand, ManageSubscriptionHandler, ManageSubscriptionResult,
};
pub use manage_subscription::{
    ManageAction, ManageMpSubscriptionCommand, ManageMpSubscriptionHandler,
    ManageMpSubscriptionResult,
};
pub use notifications::NotificationDispatcher;
pub use process_mercadopago_webhook::{ProcessMpWebhookCommand, ProcessMpWebhookHandler};
pub use process_paypal_webhook::{
    PayPalWebhookHeaders, ProcessPayPalWebhookCommand, ProcessPayPalWebhookHandler, WebhookAck,
};
pub use reconcile_subscriptions::{
    ReconcileAction, ReconcileReport, ReconcileSubscriptionsHandler,
};
