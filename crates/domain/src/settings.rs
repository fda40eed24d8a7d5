//! The singleton site configuration row.

use crate::model::Money;
use crate::rates::{EarningPolicy, RateCard};

pub const DEFAULT_SITE_NAME: &str = "dSkWala";
pub const DEFAULT_ADMOB_BANNER_ID: &str = "ca-app-pub-3940256099942544/6300978111";
pub const DEFAULT_ADMOB_INTERSTITIAL_ID: &str = "ca-app-pub-3940256099942544/1033173712";

/// Rate, payout and display configuration shared by every request.
///
/// Loaded through [`crate::services::SettingsCache`] and handed to the
/// accrual and withdrawal paths as a plain value; nothing reads it from a
/// global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub earning_per_view: Money,
    pub earning_per_1000_views: Money,
    pub earning_per_1000_downloads: Money,
    pub earning_policy: EarningPolicy,
    pub min_withdrawal: Money,
    pub site_name: String,
    pub admob_banner_id: String,
    pub admob_interstitial_id: String,
    pub meta_banner_placement_id: String,
    pub meta_interstitial_placement_id: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            earning_per_view: Money::from_micros(2_500),
            earning_per_1000_views: Money::from_micros(2_500_000),
            earning_per_1000_downloads: Money::from_micros(3_750_000),
            earning_policy: EarningPolicy::PerEvent,
            min_withdrawal: Money::from_cents(1_000),
            site_name: DEFAULT_SITE_NAME.to_string(),
            admob_banner_id: DEFAULT_ADMOB_BANNER_ID.to_string(),
            admob_interstitial_id: DEFAULT_ADMOB_INTERSTITIAL_ID.to_string(),
            meta_banner_placement_id: String::new(),
            meta_interstitial_placement_id: String::new(),
            seo_title: String::new(),
            seo_description: String::new(),
            seo_keywords: String::new(),
        }
    }
}

impl SiteSettings {
    pub fn rate_card(&self) -> RateCard {
        RateCard {
            policy: self.earning_policy,
            earning_per_view: self.earning_per_view,
            earning_per_1000_views: self.earning_per_1000_views,
            earning_per_1000_downloads: self.earning_per_1000_downloads,
        }
    }

    /// Ad unit IDs as served to the mobile client; blank AdMob IDs fall back
    /// to Google's public test units.
    pub fn ad_ids(&self) -> AdIds {
        AdIds {
            banner_id: non_blank_or(&self.admob_banner_id, DEFAULT_ADMOB_BANNER_ID),
            interstitial_id: non_blank_or(
                &self.admob_interstitial_id,
                DEFAULT_ADMOB_INTERSTITIAL_ID,
            ),
            meta_banner_id: self.meta_banner_placement_id.clone(),
            meta_interstitial_id: self.meta_interstitial_placement_id.clone(),
        }
    }

    /// Applies a partial update; string fields are trimmed.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(value) = update.earning_per_view {
            self.earning_per_view = value;
        }
        if let Some(value) = update.earning_per_1000_views {
            self.earning_per_1000_views = value;
        }
        if let Some(value) = update.earning_per_1000_downloads {
            self.earning_per_1000_downloads = value;
        }
        if let Some(value) = update.earning_policy {
            self.earning_policy = value;
        }
        if let Some(value) = update.min_withdrawal {
            self.min_withdrawal = value;
        }
        let text_fields = [
            (update.site_name, &mut self.site_name),
            (update.admob_banner_id, &mut self.admob_banner_id),
            (update.admob_interstitial_id, &mut self.admob_interstitial_id),
            (update.meta_banner_placement_id, &mut self.meta_banner_placement_id),
            (
                update.meta_interstitial_placement_id,
                &mut self.meta_interstitial_placement_id,
            ),
            (update.seo_title, &mut self.seo_title),
            (update.seo_description, &mut self.seo_description),
            (update.seo_keywords, &mut self.seo_keywords),
        ];
        for (value, slot) in text_fields {
            if let Some(value) = value {
                *slot = value.trim().to_string();
            }
        }
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdIds {
    pub banner_id: String,
    pub interstitial_id: String,
    pub meta_banner_id: String,
    pub meta_interstitial_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub earning_per_view: Option<Money>,
    pub earning_per_1000_views: Option<Money>,
    pub earning_per_1000_downloads: Option<Money>,
    pub earning_policy: Option<EarningPolicy>,
    pub min_withdrawal: Option<Money>,
    pub site_name: Option<String>,
    pub admob_banner_id: Option<String>,
    pub admob_interstitial_id: Option<String>,
    pub meta_banner_placement_id: Option<String>,
    pub meta_interstitial_placement_id: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("`{field}` must not be negative")]
    NegativeAmount { field: &'static str },
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let amounts = [
            ("earning_per_view", self.earning_per_view),
            ("earning_per_1000_views", self.earning_per_1000_views),
            ("earning_per_1000_downloads", self.earning_per_1000_downloads),
            ("min_withdrawal", self.min_withdrawal),
        ];
        for (field, value) in amounts {
            if value.is_some_and(Money::is_negative) {
                return Err(SettingsError::NegativeAmount { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_configuration() {
        let settings = SiteSettings::default();
        assert_eq!(settings.earning_per_view.to_string(), "0.002500");
        assert_eq!(settings.min_withdrawal.format_dp(2), "10.00");
        assert_eq!(settings.earning_policy, EarningPolicy::PerEvent);
    }

    #[test]
    fn blank_admob_ids_fall_back_to_test_units() {
        let settings = SiteSettings {
            admob_banner_id: "  ".into(),
            ..SiteSettings::default()
        };
        let ids = settings.ad_ids();
        assert_eq!(ids.banner_id, DEFAULT_ADMOB_BANNER_ID);
        assert_eq!(ids.meta_banner_id, "");
    }

    #[test]
    fn apply_trims_and_overrides() {
        let mut settings = SiteSettings::default();
        settings.apply(SettingsUpdate {
            min_withdrawal: Some(Money::from_cents(500)),
            admob_banner_id: Some("  banner-x ".into()),
            earning_policy: Some(EarningPolicy::Tiered),
            ..SettingsUpdate::default()
        });
        assert_eq!(settings.min_withdrawal, Money::from_cents(500));
        assert_eq!(settings.admob_banner_id, "banner-x");
        assert_eq!(settings.rate_card().policy, EarningPolicy::Tiered);
    }

    #[test]
    fn negative_rates_are_rejected() {
        let update = SettingsUpdate {
            earning_per_view: Some(Money::from_micros(-1)),
            ..SettingsUpdate::default()
        };
        assert_eq!(
            update.validate(),
            Err(SettingsError::NegativeAmount {
                field: "earning_per_view"
            })
        );
    }
}
