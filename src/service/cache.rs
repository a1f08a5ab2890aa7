//! Explicit business-key cache handed to lookups that want one.
//!
//! Entries are never re-validated: a hit may be stale until the caller
//! invalidates it, a miss always goes to storage.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug)]
pub struct ItemCache<I> {
    items: RwLock<HashMap<String, I>>,
}

impl<I> Default for ItemCache<I> {
    fn default() -> Self {
        ItemCache {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<I: Clone> ItemCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<I> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, item: I) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), item);
    }

    pub fn invalidate(&self, key: &str) -> Option<I> {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn clear(&self) {
        self.items.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
