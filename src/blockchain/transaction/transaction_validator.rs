use super::Transaction;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidateTransactionError {
    #[error("The sender must not be empty")]
    EmptySender,
    #[error("The recipient must not be empty")]
    EmptyRecipient,
    #[error("The sender and recipient are identical")]
    IdenticalSenderRecipient,
    #[error("The amount must be positive, but was {0}")]
    NonPositiveAmount(i64),
}

pub struct TransactionValidator;

impl TransactionValidator {
    /// Validates whether a transaction is well formed.
    ///
    /// The ledger itself accepts any transaction; this is only applied
    /// by callers that opt into stricter admission.
    pub fn validate(tsx: &Transaction) -> Result<(), ValidateTransactionError> {
        use ValidateTransactionError::*;

        if tsx.sender().trim().is_empty() {
            return Err(EmptySender);
        }

        if tsx.recipient().trim().is_empty() {
            return Err(EmptyRecipient);
        }

        if tsx.sender() == tsx.recipient() {
            return Err(IdenticalSenderRecipient);
        }

        if tsx.amount() <= 0 {
            return Err(NonPositiveAmount(tsx.amount()));
        }

        Ok(())
    }
}
