//! Company card transaction model.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::expense::{ExpenseId, Money, UserId};

/// Identifier of a card charge from the card feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reconciliation state of a card charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTransactionStatus {
    Unmatched,
    Matched,
    Ignored,
}

/// A charge posted on a company card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTransaction {
    pub id: TransactionId,
    pub owner_id: UserId,
    /// Last four digits of the card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
    /// Merchant as printed by the card network (e.g. "UBER *TRIP").
    pub merchant: String,
    pub amount: Money,
    pub posted_date: NaiveDate,
    pub(crate) status: CardTransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) matched_expense_id: Option<ExpenseId>,
}

impl CardTransaction {
    /// A freshly imported, unmatched charge.
    pub fn new(
        id: impl Into<String>,
        owner_id: UserId,
        merchant: impl Into<String>,
        amount: Money,
        posted_date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId(id.into()),
            owner_id,
            card_last4: None,
            merchant: merchant.into(),
            amount,
            posted_date,
            status: CardTransactionStatus::Unmatched,
            matched_expense_id: None,
        }
    }

    pub fn with_card_last4(mut self, last4: impl Into<String>) -> Self {
        self.card_last4 = Some(last4.into());
        self
    }

    pub fn status(&self) -> CardTransactionStatus {
        self.status
    }

    /// Set only while the status is `matched`.
    pub fn matched_expense_id(&self) -> Option<&ExpenseId> {
        self.matched_expense_id.as_ref()
    }
}
