//! Closure-driven [`TransferStore`] double for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::entity::Transfer;
use crate::health::HealthCheck;
use crate::store::{StoreError, TransferStore};

type SaveFn = dyn Fn(&Transfer) -> Result<Uuid, StoreError> + Send + Sync;
type ListFn = dyn Fn(&str) -> Result<Vec<Transfer>, StoreError> + Send + Sync;
type PingFn = dyn Fn() -> Result<(), StoreError> + Send + Sync;

#[derive(Clone, Default)]
pub struct TransferStoreMock {
    on_save_transfer: Option<Arc<SaveFn>>,
    on_list_all_transfers: Option<Arc<ListFn>>,
    on_ping: Option<Arc<PingFn>>,
    save_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
}

impl TransferStoreMock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_save_transfer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transfer) -> Result<Uuid, StoreError> + Send + Sync + 'static,
    {
        self.on_save_transfer = Some(Arc::new(f));
        self
    }

    pub fn on_list_all_transfers<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<Transfer>, StoreError> + Send + Sync + 'static,
    {
        self.on_list_all_transfers = Some(Arc::new(f));
        self
    }

    pub fn on_ping<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), StoreError> + Send + Sync + 'static,
    {
        self.on_ping = Some(Arc::new(f));
        self
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferStore for TransferStoreMock {
    async fn save_transfer(
        &self,
        _ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        match &self.on_save_transfer {
            Some(f) => f(transfer),
            None => Err(StoreError::Backend(
                "save_transfer not configured on mock".to_string(),
            )),
        }
    }

    async fn list_all_transfers(
        &self,
        _ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.on_list_all_transfers {
            Some(f) => f(account_id),
            None => Err(StoreError::Backend(
                "list_all_transfers not configured on mock".to_string(),
            )),
        }
    }
}

#[async_trait]
impl HealthCheck for TransferStoreMock {
    async fn ping(&self) -> Result<(), StoreError> {
        match &self.on_ping {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}
