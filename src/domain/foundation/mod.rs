//! Foundation layer: shared value objects and error types.
//!
//! Everything here is provider-agnostic and free of I/O. The billing domain
//! and the ports build on these primitives.

mod errors;
mod ids;
mod state_machine;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CompanyId, PaymentTransactionId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
