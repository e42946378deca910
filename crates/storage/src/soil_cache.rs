//! Caller-owned memo of soil profiles.
//!
//! Every profile a store returns is kept, empty ones included, so each soil
//! id reaches the store at most once. Store errors are not cached.

use std::collections::HashMap;

use sim_common::SoilProfile;

use crate::error::Result;
use crate::soil_store::SoilProfileStore;

/// Hit and miss counters.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

pub struct SoilProfileCache<S> {
    store: S,
    entries: HashMap<i64, SoilProfile>,
    hits: u64,
    misses: u64,
}

impl<S: SoilProfileStore> SoilProfileCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Profile for `soil_id`, querying the store on first use only.
    pub async fn get(&mut self, soil_id: i64) -> Result<SoilProfile> {
        if let Some(profile) = self.entries.get(&soil_id) {
            self.hits += 1;
            return Ok(profile.clone());
        }

        self.misses += 1;
        let profile = self.store.profile(soil_id).await?;
        self.entries.insert(soil_id, profile.clone());
        Ok(profile)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use async_trait::async_trait;
    use sim_common::SoilLayer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store answering soil id 1 with one layer, 2 with an error and
    /// everything else with an empty profile.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SoilProfileStore for CountingStore {
        async fn profile(&self, soil_id: i64) -> Result<SoilProfile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match soil_id {
                1 => Ok(SoilProfile::new(vec![SoilLayer::with_thickness(0.3)])),
                2 => Err(StorageError::InvalidProfile {
                    soil_id,
                    message: "broken".into(),
                }),
                _ => Ok(SoilProfile::default()),
            }
        }
    }

    #[test]
    fn test_second_lookup_skips_store() {
        tokio_test::block_on(async {
            let mut cache = SoilProfileCache::new(CountingStore::default());
            let first = cache.get(1).await.unwrap();
            let second = cache.get(1).await.unwrap();
            assert_eq!(first, second);
            assert_eq!(cache.store().calls.load(Ordering::SeqCst), 1);
            assert_eq!(cache.stats().hits, 1);
            assert_eq!(cache.stats().misses, 1);
        });
    }

    #[test]
    fn test_empty_profiles_are_cached() {
        tokio_test::block_on(async {
            let mut cache = SoilProfileCache::new(CountingStore::default());
            assert!(cache.get(99).await.unwrap().is_empty());
            assert!(cache.get(99).await.unwrap().is_empty());
            assert_eq!(cache.store().calls.load(Ordering::SeqCst), 1);
            assert_eq!(cache.stats().entries, 1);
        });
    }

    #[test]
    fn test_errors_are_not_cached() {
        tokio_test::block_on(async {
            let mut cache = SoilProfileCache::new(CountingStore::default());
            assert!(cache.get(2).await.is_err());
            assert!(cache.get(2).await.is_err());
            assert_eq!(cache.store().calls.load(Ordering::SeqCst), 2);
            assert_eq!(cache.stats().entries, 0);
        });
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            entries: 1,
        };
        assert_eq!(stats.hit_rate(), 75.0);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
