//! Storage backends for users and projects

pub mod memory;
pub mod traits;

pub use memory::MemoryStorageProvider;
pub use traits::{ProjectStorage, SessionStorage, StorageProvider, UserStorage};

use std::sync::Arc;

use crate::error::{ApiError, Result};

/// Open the backend named by a store URL
pub fn open(store_url: &str) -> Result<Arc<dyn StorageProvider>> {
    if store_url.starts_with("memory://") {
        log::info!("Using in-memory storage; data is lost on restart");
        Ok(MemoryStorageProvider::shared())
    } else {
        Err(ApiError::Config(format!("Unsupported store URL: {}", store_url)))
    }
}
