use async_trait::async_trait;

use crate::store::StoreError;

/// Liveness of the backing storage, used by readiness endpoints.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}
