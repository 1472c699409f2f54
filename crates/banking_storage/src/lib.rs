pub mod repository;

pub use repository::{BankingStorage, StorageConfig};
