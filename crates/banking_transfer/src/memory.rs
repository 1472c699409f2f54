use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::entity::Transfer;
use crate::health::HealthCheck;
use crate::store::{StoreError, TransferStore};

/// Process-local store. Lists transfers where the account is either side,
/// in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryTransferStore {
    transfers: RwLock<Vec<Transfer>>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transfers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transfers.read().await.is_empty()
    }
}

#[async_trait]
impl HealthCheck for InMemoryTransferStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn save_transfer(
        &self,
        ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError> {
        ctx.run(async {
            let id = Uuid::now_v7();
            let mut guard = self.transfers.write().await;
            guard.push(transfer.clone().with_id(id));
            Ok(id)
        })
        .await
    }

    async fn list_all_transfers(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError> {
        ctx.run(async {
            let guard = self.transfers.read().await;
            Ok(guard
                .iter()
                .filter(|transfer| transfer.involves(account_id))
                .cloned()
                .collect())
        })
        .await
    }
}
