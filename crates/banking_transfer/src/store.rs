//! Storage port for transfers.
//!
//! The use case depends on this trait only. Concrete stores (SQLite, the
//! in-memory store, test doubles) live behind it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::entity::Transfer;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid transfer: {0}")]
    Invalid(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("request cancelled")]
    Cancelled,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Transient failures a caller may retry. The use case never does.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::DeadlineExceeded)
    }
}

#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Persists one transfer and returns the identifier assigned to it.
    async fn save_transfer(
        &self,
        ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError>;

    /// Lists every transfer the store associates with `account_id`.
    /// An empty list is a valid answer.
    async fn list_all_transfers(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError>;
}

#[async_trait]
impl<S> TransferStore for Arc<S>
where
    S: TransferStore + ?Sized,
{
    async fn save_transfer(
        &self,
        ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError> {
        (**self).save_transfer(ctx, transfer).await
    }

    async fn list_all_transfers(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError> {
        (**self).list_all_transfers(ctx, account_id).await
    }
}

#[async_trait]
impl<S> TransferStore for Box<S>
where
    S: TransferStore + ?Sized,
{
    async fn save_transfer(
        &self,
        ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError> {
        (**self).save_transfer(ctx, transfer).await
    }

    async fn list_all_transfers(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError> {
        (**self).list_all_transfers(ctx, account_id).await
    }
}
