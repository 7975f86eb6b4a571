use crate::verdict::Assessment;
use dashmap::DashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    #[default]
    UseCache,
    NoCache,
}

/// URL → assessment map shared between concurrent requests.
///
/// Capacity is an upper bound: once full, new URLs are simply not stored.
#[derive(Clone)]
pub struct AssessmentCache {
    cache: Arc<DashMap<String, Assessment>>,
    capacity: usize,
}

impl AssessmentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).map_or(100, NonZeroUsize::get);
        Self {
            cache: Arc::new(DashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<Assessment> {
        self.cache.get(key).map(|entry| entry.clone())
    }

    /// Returns false when the cache is full and `key` is new.
    pub fn set(&self, key: String, value: Assessment) -> bool {
        if self.cache.len() >= self.capacity && !self.cache.contains_key(&key) {
            return false;
        }
        self.cache.insert(key, value);
        true
    }

    pub fn remove(&self, key: &str) -> Option<Assessment> {
        self.cache.remove(key).map(|(_, v)| v)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
