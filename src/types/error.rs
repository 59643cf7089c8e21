//! Error types for the JIT funding engine
//!
//! This module defines all error types that can occur across the
//! authorization engine, the event pipeline, and the budget monitor.
//!
//! # Error Categories
//!
//! - **Validation Errors**: malformed webhooks or budget drafts, rejected at
//!   the boundary before reaching business logic
//! - **Store Errors**: a backing store could not serve a required read or
//!   write; the authorization path treats these as fail-closed declines
//! - **Settlement Errors**: unknown transactions, duplicate records,
//!   arithmetic overflow/underflow in balance or counter updates
//! - **Event Errors**: subscription limits and handler failures
//!
//! Decline reasons are deliberately *not* here: they are normal decision
//! outcomes, returned as data in [`crate::types::Decision`].

use thiserror::Error;

/// Main error type for the platform core
///
/// Each variant carries enough context to diagnose the failure without
/// re-querying the stores.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlatformError {
    /// A backing store could not complete an operation
    ///
    /// During authorization this fails closed: the decision becomes a
    /// decline with reason `check_unavailable`, never a silent approve.
    #[error("{resource} store unavailable: {message}")]
    StoreUnavailable {
        /// The store that failed (accounts, cards, transactions, ...)
        resource: String,
        /// Description of the failure
        message: String,
    },

    /// A referenced transaction does not exist
    #[error("Transaction {id} not found for {operation}")]
    TransactionNotFound {
        /// Transaction identifier that was not found
        id: String,
        /// Operation that failed
        operation: String,
    },

    /// A transaction with this identifier already exists
    #[error("Duplicate transaction {id}")]
    DuplicateTransaction {
        /// The duplicated transaction identifier
        id: String,
    },

    /// No account exists for the user during settlement
    #[error("Account {user_id} not found for {operation}")]
    AccountNotFound {
        /// The missing user identifier
        user_id: String,
        /// Operation that failed
        operation: String,
    },

    /// A referenced card does not exist
    #[error("Card {card_id} not found for {operation}")]
    CardNotFound {
        /// The missing card identifier
        card_id: String,
        /// Operation that failed
        operation: String,
    },

    /// A card lifecycle transition is not allowed
    #[error("Card {card_id} cannot transition from {from} to {to}")]
    InvalidCardTransition {
        /// The card being transitioned
        card_id: String,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Arithmetic overflow would occur in a balance or counter update
    #[error("Arithmetic overflow in {operation} for {subject}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Card or user the update applies to
        subject: String,
    },

    /// Arithmetic underflow would occur in a balance or counter update
    #[error("Arithmetic underflow in {operation} for {subject}")]
    ArithmeticUnderflow {
        /// Operation that would underflow
        operation: String,
        /// Card or user the update applies to
        subject: String,
    },

    /// An inbound webhook failed boundary validation
    #[error("Invalid webhook field '{field}': {message}")]
    InvalidWebhook {
        /// The offending field
        field: String,
        /// Why it was rejected
        message: String,
    },

    /// A referenced budget does not exist
    #[error("Budget {id} not found")]
    BudgetNotFound {
        /// The missing budget identifier
        id: String,
    },

    /// A budget creation payload failed boundary validation
    #[error("Invalid budget field '{field}': {message}")]
    InvalidBudget {
        /// The offending field
        field: String,
        /// Why it was rejected
        message: String,
    },

    /// The per-event subscription cap was reached
    ///
    /// The cap exists to catch runaway registration bugs; 50 listeners per
    /// event is far above any legitimate handler count.
    #[error("Listener limit ({limit}) reached for event '{event}'")]
    ListenerLimit {
        /// Event name whose capacity was exhausted
        event: String,
        /// The configured cap
        limit: usize,
    },

    /// An event handler reported failure
    ///
    /// Surfaced per handler by the bus; never propagated to publishers.
    #[error("Handler failed for event '{event}': {message}")]
    HandlerFailed {
        /// Event name the handler was invoked for
        event: String,
        /// Handler-reported failure description
        message: String,
    },
}

// Helper functions for creating common errors

impl PlatformError {
    /// Create a StoreUnavailable error
    pub fn store_unavailable(resource: &str, message: impl Into<String>) -> Self {
        PlatformError::StoreUnavailable {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(id: &str, operation: &str) -> Self {
        PlatformError::TransactionNotFound {
            id: id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create a DuplicateTransaction error
    pub fn duplicate_transaction(id: &str) -> Self {
        PlatformError::DuplicateTransaction { id: id.to_string() }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(user_id: &str, operation: &str) -> Self {
        PlatformError::AccountNotFound {
            user_id: user_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create a CardNotFound error
    pub fn card_not_found(card_id: &str, operation: &str) -> Self {
        PlatformError::CardNotFound {
            card_id: card_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidCardTransition error
    pub fn invalid_card_transition(card_id: &str, from: &str, to: &str) -> Self {
        PlatformError::InvalidCardTransition {
            card_id: card_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, subject: &str) -> Self {
        PlatformError::ArithmeticOverflow {
            operation: operation.to_string(),
            subject: subject.to_string(),
        }
    }

    /// Create an ArithmeticUnderflow error
    pub fn arithmetic_underflow(operation: &str, subject: &str) -> Self {
        PlatformError::ArithmeticUnderflow {
            operation: operation.to_string(),
            subject: subject.to_string(),
        }
    }

    /// Create an InvalidWebhook error
    pub fn invalid_webhook(field: &str, message: impl Into<String>) -> Self {
        PlatformError::InvalidWebhook {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Create a BudgetNotFound error
    pub fn budget_not_found(id: &str) -> Self {
        PlatformError::BudgetNotFound { id: id.to_string() }
    }

    /// Create an InvalidBudget error
    pub fn invalid_budget(field: &str, message: impl Into<String>) -> Self {
        PlatformError::InvalidBudget {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Create a ListenerLimit error
    pub fn listener_limit(event: &str, limit: usize) -> Self {
        PlatformError::ListenerLimit {
            event: event.to_string(),
            limit,
        }
    }

    /// Create a HandlerFailed error
    pub fn handler_failed(event: &str, message: impl Into<String>) -> Self {
        PlatformError::HandlerFailed {
            event: event.to_string(),
            message: message.into(),
        }
    }
}
