mod transaction_validator;

pub use transaction_validator::{TransactionValidator, ValidateTransactionError};

use serde::{Deserialize, Serialize};

// Field declaration order is part of the canonical block encoding
// and must stay alphabetical.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Transaction {
    amount: i64,
    recipient: String,
    sender: String,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Self {
            amount,
            recipient: recipient.into(),
            sender: sender.into(),
        }
    }

    // getters

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}
