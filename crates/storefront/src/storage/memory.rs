//! In-memory object storage.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::{ObjectStorage, StorageError};

#[derive(Debug, Default)]
struct StorageState {
    objects: BTreeMap<String, (String, usize)>,
    should_fail: bool,
}

/// Object storage that keeps names, content types and sizes in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<RwLock<StorageState>>,
}

impl InMemoryStorage {
    /// Base of the URLs this storage hands out.
    pub const BASE_URL: &'static str = "https://files.storage.test";

    /// Make subsequent uploads fail.
    pub fn set_fail(&self, should_fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).should_fail = should_fail;
    }

    /// Stored objects as `(name, content type, size)`.
    #[must_use]
    pub fn objects(&self) -> Vec<(String, String, usize)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .iter()
            .map(|(name, (content_type, size))| (name.clone(), content_type.clone(), *size))
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(
        &self,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.should_fail {
            return Err(StorageError::Unavailable("simulated outage".to_owned()));
        }
        state
            .objects
            .insert(object_name.to_owned(), (content_type.to_owned(), bytes.len()));
        Ok(format!("{}/{object_name}", Self::BASE_URL))
    }
}
