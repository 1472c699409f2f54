use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One transfer instruction between two accounts.
///
/// `amount` is expressed in the smallest currency unit (cents). The `id` stays
/// nil until a store acknowledges the save and hands back the assigned value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub id: Uuid,
    pub account_origin_id: String,
    pub account_destination_id: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferValidationError {
    #[error("account_origin_id cannot be empty")]
    EmptyOrigin,
    #[error("account_destination_id cannot be empty")]
    EmptyDestination,
    #[error("origin and destination must be different accounts")]
    SelfTransfer,
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
}

impl Transfer {
    pub fn new(
        account_origin_id: impl Into<String>,
        account_destination_id: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            account_origin_id: account_origin_id.into(),
            account_destination_id: account_destination_id.into(),
            amount,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn is_saved(&self) -> bool {
        !self.id.is_nil()
    }

    pub fn involves(&self, account_id: &str) -> bool {
        self.account_origin_id == account_id || self.account_destination_id == account_id
    }

    /// Checks the entity invariants. Reports the first violated rule.
    pub fn validate(&self) -> Result<(), TransferValidationError> {
        let origin = self.account_origin_id.trim();
        let destination = self.account_destination_id.trim();
        if origin.is_empty() {
            return Err(TransferValidationError::EmptyOrigin);
        }
        if destination.is_empty() {
            return Err(TransferValidationError::EmptyDestination);
        }
        if origin == destination {
            return Err(TransferValidationError::SelfTransfer);
        }
        if self.amount <= 0 {
            return Err(TransferValidationError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Transfer, TransferValidationError};
    use uuid::Uuid;

    #[test]
    fn new_transfer_is_unsaved() {
        let transfer = Transfer::new("acc-x", "acc-y", 2550);

        assert!(transfer.id.is_nil());
        assert!(!transfer.is_saved());
        assert!(transfer.validate().is_ok());

        let saved = transfer.with_id(Uuid::now_v7());
        assert!(saved.is_saved());
    }

    #[test]
    fn validate_rejects_broken_invariants() {
        assert_eq!(
            Transfer::new("", "acc-y", 10).validate(),
            Err(TransferValidationError::EmptyOrigin)
        );
        assert_eq!(
            Transfer::new("acc-x", "  ", 10).validate(),
            Err(TransferValidationError::EmptyDestination)
        );
        assert_eq!(
            Transfer::new("acc-x", "acc-x", 10).validate(),
            Err(TransferValidationError::SelfTransfer)
        );
        assert_eq!(
            Transfer::new("acc-x", " acc-x ", 10).validate(),
            Err(TransferValidationError::SelfTransfer)
        );
        assert_eq!(
            Transfer::new("acc-x", "acc-y", 0).validate(),
            Err(TransferValidationError::NonPositiveAmount(0))
        );
    }

    #[test]
    fn involves_matches_either_side() {
        let transfer = Transfer::new("acc-x", "acc-y", 1);
        assert!(transfer.involves("acc-x"));
        assert!(transfer.involves("acc-y"));
        assert!(!transfer.involves("acc-z"));
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let transfer = Transfer::new("acc-x", "acc-y", 2550);
        let value = serde_json::to_value(&transfer).expect("serialize");

        assert_eq!(value["account_origin_id"], "acc-x");
        assert_eq!(value["amount"], 2550);
        assert_eq!(value["id"], Uuid::nil().to_string());
    }
}
