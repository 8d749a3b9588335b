use thiserror::Error;

/// Rejected state transitions and business rule violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Cannot change order from {from} to {to}")]
    InvalidOrderTransition { from: String, to: String },
    #[error("Order can no longer be cancelled")]
    OrderNotCancellable,
    #[error("Order has already been paid")]
    OrderAlreadyPaid,
    #[error("Cannot change session from {from} to {to}")]
    InvalidSessionTransition { from: String, to: String },
    #[error("Session can only be started within 15 minutes of its scheduled time")]
    SessionNotStartable,
    #[error("Only completed sessions can be rated")]
    SessionNotCompleted,
    #[error("Session has already been rated")]
    SessionAlreadyRated,
    #[error("No sessions remaining in this subscription")]
    NoSessionsRemaining,
    #[error("Subscription is not active")]
    SubscriptionNotActive,
    #[error("Cannot change subscription from {from} to {to}")]
    InvalidSubscriptionTransition { from: String, to: String },
    #[error("You already have an active subscription")]
    ActiveSubscriptionExists,
    #[error("Product {0} is not available")]
    ProductUnavailable(String),
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),
    #[error("Trainer has reached the maximum number of trainees")]
    TrainerAtCapacity,
}
