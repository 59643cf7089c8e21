//! Account-related types for the JIT funding engine
//!
//! This module defines the user account structure holding the available
//! balance that authorization decisions are made against.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User account state
///
/// Represents the funds available to a cardholder. The balance is the
/// source of truth for the balance check during authorization and is only
/// mutated through settlement of confirmed transactions, never directly by
/// the decision path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Opaque user identifier (card network token)
    pub user_id: String,

    /// Funds available for new authorizations
    ///
    /// Fixed-point decimal; an approved authorization must never leave
    /// this negative. Decremented exactly once per settled transaction.
    pub balance: Decimal,
}

impl UserAccount {
    /// Create a new account with a zero balance
    pub fn new(user_id: impl Into<String>) -> Self {
        UserAccount {
            user_id: user_id.into(),
            balance: Decimal::ZERO,
        }
    }

    /// Create a new account with an opening balance
    pub fn with_balance(user_id: impl Into<String>, balance: Decimal) -> Self {
        UserAccount {
            user_id: user_id.into(),
            balance,
        }
    }
}
