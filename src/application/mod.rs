//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::billing::{
    ActivateSubscriptionCommand, ActivateSubscriptionHandler, ChangePayPalPlanCommand,
    ChangePayPalPlanHandler, CompanyAction, CreateMpSubscriptionCommand,
    CreateMpSubscriptionHandler, CreateSubscriptionCommand, CreateSubscriptionHandler,
    GetMpSubscriptionStatusCommand, GetMpSubscriptionStatusHandler, ManageAction,
    ManageMpSubscriptionCommand, ManageMpSubscriptionHandler, ManageSubscriptionCommand,
    ManageSubscriptionHandler, NotificationDispatcher, PayPalCheckoutUrls, PayPalWebhookHeaders,
    ProcessMpWebhookCommand, ProcessMpWebhookHandler, ProcessPayPalWebhookCommand,
    ProcessPayPalWebhookHandler, ReconcileSubscriptionsHandler, SubscriptionStateMachine,
    WebhookAck,
};
