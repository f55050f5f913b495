use std::sync::Arc;

use crate::entities::Entity;
use crate::store::{EntityStore, StoreResult};

/// Entity listing over the store.
pub struct CatalogService {
    store: Arc<dyn EntityStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Entities whose name or description contains `search` (ignoring case) and that carry
    /// `tag`. Empty arguments match everything.
    pub fn entities(&self, search: &str, tag: &str) -> StoreResult<Vec<Entity>> {
        self.store.find_all(search.trim(), tag.trim())
    }
}
