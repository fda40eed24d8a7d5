use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use diskwala_domain::services::{AbuseTracker, Mailer, SettingsCache, TelemetryGuard};
use diskwala_domain::settings::SiteSettings;
use diskwala_domain::storage::StorageResult;
use diskwala_storage::SeaOrmStorage;

#[derive(Clone)]
pub struct AppState {
    storage: SeaOrmStorage,
    settings: SettingsCache,
    telemetry: TelemetryGuard,
    abuse_tracker: AbuseTracker,
    mailer: Arc<dyn Mailer>,
    otp_ttl: Duration,
    trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    pub fn new(
        storage: SeaOrmStorage,
        settings: SettingsCache,
        telemetry: TelemetryGuard,
        mailer: Arc<dyn Mailer>,
        otp_ttl: Duration,
    ) -> Self {
        let abuse_tracker = AbuseTracker::new(telemetry.abuse_threshold());
        Self {
            storage,
            settings,
            telemetry,
            abuse_tracker,
            mailer,
            otp_ttl,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    pub fn with_trusted_proxies(mut self, proxies: &[IpAddr]) -> Self {
        self.trusted_proxies = Arc::from(proxies);
        self
    }

    pub fn storage(&self) -> &SeaOrmStorage {
        &self.storage
    }

    /// Current site settings snapshot, served from the TTL cache.
    pub async fn site_settings(&self) -> StorageResult<Arc<SiteSettings>> {
        self.settings.load(&self.storage).await
    }

    pub fn settings_cache(&self) -> &SettingsCache {
        &self.settings
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    pub fn abuse_tracker(&self) -> &AbuseTracker {
        &self.abuse_tracker
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    pub fn otp_ttl(&self) -> Duration {
        self.otp_ttl
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.trusted_proxies
    }
}
