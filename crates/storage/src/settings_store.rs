use diskwala_domain::model::Money;
use diskwala_domain::settings::{SettingsUpdate, SiteSettings};
use diskwala_domain::storage::{SettingsStore, StorageResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, TransactionTrait};

use crate::entity::site_settings::{self, SINGLETON_ID};
use crate::errors::{db_error, StorageError};
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl SettingsStore for SeaOrmStorage {
    async fn load_settings(&self) -> StorageResult<SiteSettings> {
        load_or_create(self.connection()).await.map(settings_from_model)
    }

    async fn update_settings(&self, update: SettingsUpdate) -> StorageResult<SiteSettings> {
        let txn = self.connection().begin().await.map_err(db_error)?;
        let current = load_or_create(&txn).await?;
        let mut settings = settings_from_model(current.clone());
        settings.apply(update);

        let mut active: site_settings::ActiveModel = current.into();
        active.earning_per_view = Set(settings.earning_per_view.micros());
        active.earning_per_1000_views = Set(settings.earning_per_1000_views.micros());
        active.earning_per_1000_downloads = Set(settings.earning_per_1000_downloads.micros());
        active.earning_policy = Set(settings.earning_policy.into());
        active.min_withdrawal = Set(settings.min_withdrawal.micros());
        active.site_name = Set(settings.site_name.clone());
        active.admob_banner_id = Set(settings.admob_banner_id.clone());
        active.admob_interstitial_id = Set(settings.admob_interstitial_id.clone());
        active.meta_banner_placement_id = Set(settings.meta_banner_placement_id.clone());
        active.meta_interstitial_placement_id =
            Set(settings.meta_interstitial_placement_id.clone());
        active.seo_title = Set(settings.seo_title.clone());
        active.seo_description = Set(settings.seo_description.clone());
        active.seo_keywords = Set(settings.seo_keywords.clone());
        let saved = active.update(&txn).await.map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;
        Ok(settings_from_model(saved))
    }
}

/// Get-or-create on the singleton row; concurrent creators race on the
/// primary key and the loser re-reads.
async fn load_or_create<C: ConnectionTrait>(db: &C) -> StorageResult<site_settings::Model> {
    if let Some(model) = site_settings::Entity::find_by_id(SINGLETON_ID)
        .one(db)
        .await
        .map_err(db_error)?
    {
        return Ok(model);
    }

    site_settings::Entity::insert(default_row())
        .on_conflict(
            OnConflict::column(site_settings::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(db_error)?;

    site_settings::Entity::find_by_id(SINGLETON_ID)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StorageError::Database("site settings row missing".into()))
}

fn default_row() -> site_settings::ActiveModel {
    let defaults = SiteSettings::default();
    site_settings::ActiveModel {
        id: Set(SINGLETON_ID),
        earning_per_view: Set(defaults.earning_per_view.micros()),
        earning_per_1000_views: Set(defaults.earning_per_1000_views.micros()),
        earning_per_1000_downloads: Set(defaults.earning_per_1000_downloads.micros()),
        earning_policy: Set(defaults.earning_policy.into()),
        min_withdrawal: Set(defaults.min_withdrawal.micros()),
        site_name: Set(defaults.site_name),
        admob_banner_id: Set(defaults.admob_banner_id),
        admob_interstitial_id: Set(defaults.admob_interstitial_id),
        meta_banner_placement_id: Set(defaults.meta_banner_placement_id),
        meta_interstitial_placement_id: Set(defaults.meta_interstitial_placement_id),
        seo_title: Set(defaults.seo_title),
        seo_description: Set(defaults.seo_description),
        seo_keywords: Set(defaults.seo_keywords),
    }
}

fn settings_from_model(model: site_settings::Model) -> SiteSettings {
    SiteSettings {
        earning_per_view: Money::from_micros(model.earning_per_view),
        earning_per_1000_views: Money::from_micros(model.earning_per_1000_views),
        earning_per_1000_downloads: Money::from_micros(model.earning_per_1000_downloads),
        earning_policy: model.earning_policy.into(),
        min_withdrawal: Money::from_micros(model.min_withdrawal),
        site_name: model.site_name,
        admob_banner_id: model.admob_banner_id,
        admob_interstitial_id: model.admob_interstitial_id,
        meta_banner_placement_id: model.meta_banner_placement_id,
        meta_interstitial_placement_id: model.meta_interstitial_placement_id,
        seo_title: model.seo_title,
        seo_description: model.seo_description,
        seo_keywords: model.seo_keywords,
    }
}
