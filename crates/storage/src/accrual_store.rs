use chrono::NaiveDate;
use diskwala_domain::accrual::{AccessEvent, AccessPlan, AccrualDelta, FirstAccess};
use diskwala_domain::model::{truncate_user_agent, FileCounters};
use diskwala_domain::settings::SiteSettings;
use diskwala_domain::storage::{AccessOutcome, AccrualStore, StorageError, StorageResult};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::debug;

use crate::entity::{file_downloads, file_views, user_files, users};
use crate::errors::db_error;
use crate::file_store::file_to_record;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl AccrualStore for SeaOrmStorage {
    async fn record_access(
        &self,
        event: AccessEvent,
        settings: &SiteSettings,
    ) -> StorageResult<Option<AccessOutcome>> {
        let txn = self.connection().begin().await.map_err(db_error)?;

        // Write before reading: the no-op update takes the row lock on
        // PostgreSQL and the write lock on SQLite, so concurrent accesses to
        // the same file queue here instead of working from a stale snapshot.
        let claimed = user_files::Entity::update_many()
            .col_expr(
                user_files::Column::Views,
                Expr::col(user_files::Column::Views).into(),
            )
            .filter(user_files::Column::ShortCode.eq(event.short_code.as_str()))
            .filter(user_files::Column::IsActive.eq(true))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        if claimed.rows_affected == 0 {
            return Ok(None);
        }

        let Some(file) = user_files::Entity::find()
            .filter(user_files::Column::ShortCode.eq(event.short_code.as_str()))
            .one(&txn)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let owner = users::Entity::find_by_id(file.user_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StorageError::Database(format!("file {} has no owner", file.id)))?;

        let plan = AccessPlan::classify(file.file_type.into(), event.download_requested);
        let day = event.access_day();
        let user_agent = truncate_user_agent(&event.user_agent);

        let mut first = FirstAccess::default();
        if plan.count_view {
            first.view = log_view(&txn, file.id, &event, &user_agent, day).await?;
        }
        if plan.is_download_action {
            first.download = log_download(&txn, file.id, &event, &user_agent, day).await?;
        }

        let before = FileCounters {
            views: file.views,
            unique_views: file.unique_views,
            downloads: file.downloads,
            unique_downloads: file.unique_downloads,
        };
        let delta = AccrualDelta::compute(plan, first, &before, &settings.rate_card());

        if !delta.is_empty() {
            apply_to_file(&txn, file.id, &delta).await?;
        }
        let earned = delta.total_earning();
        if !earned.is_zero() {
            users::Entity::update_many()
                .col_expr(
                    users::Column::PendingEarnings,
                    Expr::col(users::Column::PendingEarnings).add(earned.micros()),
                )
                .col_expr(
                    users::Column::TotalEarnings,
                    Expr::col(users::Column::TotalEarnings).add(earned.micros()),
                )
                .filter(users::Column::Id.eq(owner.id))
                .exec(&txn)
                .await
                .map_err(db_error)?;
        }

        let updated = user_files::Entity::find_by_id(file.id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StorageError::Database(format!("file {} vanished", file.id)))?;
        txn.commit().await.map_err(db_error)?;

        debug!(
            file_id = updated.id,
            first_view = first.view,
            first_download = first.download,
            earned = %earned,
            "access recorded"
        );

        Ok(Some(AccessOutcome {
            file: file_to_record(updated),
            delta,
            should_download: owner.allow_download && plan.is_download_action,
        }))
    }
}

async fn apply_to_file(
    txn: &DatabaseTransaction,
    file_id: i64,
    delta: &AccrualDelta,
) -> StorageResult<()> {
    let bump = |column: user_files::Column, by: i64| (column, Expr::col(column).add(by));
    let mut update = user_files::Entity::update_many();
    for (column, expr) in [
        bump(user_files::Column::Views, delta.views),
        bump(user_files::Column::UniqueViews, delta.unique_views),
        bump(user_files::Column::Downloads, delta.downloads),
        bump(user_files::Column::UniqueDownloads, delta.unique_downloads),
        bump(user_files::Column::Earnings, delta.total_earning().micros()),
        bump(
            user_files::Column::DownloadEarnings,
            delta.download_earning.micros(),
        ),
    ] {
        update = update.col_expr(column, expr);
    }
    update
        .filter(user_files::Column::Id.eq(file_id))
        .exec(txn)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Conditional insert into the view ledger; `true` when this is the first
/// view from the IP for the file on `day`.
async fn log_view<C: ConnectionTrait>(
    db: &C,
    file_id: i64,
    event: &AccessEvent,
    user_agent: &str,
    day: NaiveDate,
) -> StorageResult<bool> {
    let row = file_views::ActiveModel {
        file_id: Set(file_id),
        ip_address: Set(event.client_ip.clone()),
        user_agent: Set(user_agent.to_string()),
        access_day: Set(day),
        accessed_at: Set(event.occurred_at),
        ..Default::default()
    };
    let inserted = file_views::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                file_views::Column::FileId,
                file_views::Column::IpAddress,
                file_views::Column::AccessDay,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(db_error)?;
    Ok(inserted == 1)
}

async fn log_download<C: ConnectionTrait>(
    db: &C,
    file_id: i64,
    event: &AccessEvent,
    user_agent: &str,
    day: NaiveDate,
) -> StorageResult<bool> {
    let row = file_downloads::ActiveModel {
        file_id: Set(file_id),
        ip_address: Set(event.client_ip.clone()),
        user_agent: Set(user_agent.to_string()),
        access_day: Set(day),
        accessed_at: Set(event.occurred_at),
        ..Default::default()
    };
    let inserted = file_downloads::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                file_downloads::Column::FileId,
                file_downloads::Column::IpAddress,
                file_downloads::Column::AccessDay,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(db_error)?;
    Ok(inserted == 1)
}
