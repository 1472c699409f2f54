use std::sync::Arc;

use uuid::Uuid;

use crate::context::RequestContext;
use crate::entity::Transfer;
use crate::store::{StoreError, TransferStore};

/// Transfer orchestration on top of a [`TransferStore`].
///
/// Both operations make exactly one store call and hand its result back
/// as-is. Validation, retries and logging belong to the caller or the store.
#[derive(Clone)]
pub struct TransferUseCase {
    store: Arc<dyn TransferStore>,
}

impl TransferUseCase {
    pub fn new(store: Arc<dyn TransferStore>) -> Self {
        Self { store }
    }

    pub async fn create_transfer(
        &self,
        ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError> {
        self.store.save_transfer(ctx, transfer).await
    }

    pub async fn show_transfers(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.store.list_all_transfers(ctx, account_id).await
    }
}
