use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::settings::SiteSettings;
use crate::storage::{SettingsStore, StorageResult};

/// TTL cache in front of the singleton settings row.
///
/// Readers get an owned snapshot that they pass down explicitly; writers
/// call [`SettingsCache::invalidate`] after persisting an update.
#[derive(Debug, Clone)]
pub struct SettingsCache {
    entry: Cache<(), Arc<SiteSettings>>,
}

impl SettingsCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
        }
    }

    pub fn cached(&self) -> Option<Arc<SiteSettings>> {
        self.entry.get(&())
    }

    pub fn insert(&self, settings: SiteSettings) -> Arc<SiteSettings> {
        let settings = Arc::new(settings);
        self.entry.insert((), settings.clone());
        settings
    }

    pub fn invalidate(&self) {
        self.entry.invalidate(&());
    }

    /// Returns the cached snapshot or loads (and caches) a fresh one.
    pub async fn load<S>(&self, store: &S) -> StorageResult<Arc<SiteSettings>>
    where
        S: SettingsStore + ?Sized,
    {
        if let Some(hit) = self.cached() {
            return Ok(hit);
        }
        let fresh = store.load_settings().await?;
        Ok(self.insert(fresh))
    }
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Money;

    #[test]
    fn insert_then_invalidate() {
        let cache = SettingsCache::default();
        assert!(cache.cached().is_none());

        cache.insert(SiteSettings::default());
        assert_eq!(
            cache.cached().map(|s| s.min_withdrawal),
            Some(Money::from_cents(1_000))
        );

        cache.invalidate();
        assert!(cache.cached().is_none());
    }

    #[test]
    fn insert_replaces_snapshot() {
        let cache = SettingsCache::default();
        cache.insert(SiteSettings::default());
        cache.insert(SiteSettings {
            site_name: "Other".into(),
            ..SiteSettings::default()
        });
        assert_eq!(
            cache.cached().map(|s| s.site_name.clone()),
            Some("Other".to_string())
        );
    }
}
