pub mod context;
pub mod entity;
pub mod health;
pub mod memory;
pub mod store;
pub mod usecase;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use context::{CancelHandle, RequestContext};
pub use entity::{Transfer, TransferValidationError};
pub use health::HealthCheck;
pub use memory::InMemoryTransferStore;
pub use store::{StoreError, TransferStore};
pub use usecase::TransferUseCase;

#[cfg(any(test, feature = "testing"))]
pub use mock::TransferStoreMock;
