use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use diskwala_domain::model::{
    ActivityReport, DailyActivity, FileCounters, FileId, FileRecord, FileUpdate, FileWithOwner,
    Money, NewFile, PlatformStats, ShortCode, UserId,
};
use diskwala_domain::storage::{FileStore, StorageResult};
use sea_orm::sea_query::{Alias, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};

use crate::entity::user_files::{self, FileTypeDb};
use crate::entity::withdrawals::WithdrawalStatusDb;
use crate::entity::{file_downloads, file_views, users, withdrawals};
use crate::errors::db_error;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl FileStore for SeaOrmStorage {
    async fn insert_file(&self, file: NewFile, short_code: ShortCode) -> StorageResult<FileRecord> {
        let now = Utc::now();
        let model = user_files::ActiveModel {
            user_id: Set(file.user_id),
            title: Set(file.title),
            description: Set(file.description),
            file_type: Set(FileTypeDb::from(file.file_type)),
            short_code: Set(short_code.into_inner()),
            file_url: Set(file.file_url),
            thumbnail_url: Set(file.thumbnail_url),
            views: Set(0),
            unique_views: Set(0),
            downloads: Set(0),
            unique_downloads: Set(0),
            earnings: Set(0),
            download_earnings: Set(0),
            allow_download: Set(file.allow_download),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(self.connection()).await.map_err(db_error)?;
        Ok(file_to_record(created))
    }

    async fn find_file(&self, id: FileId) -> StorageResult<Option<FileRecord>> {
        let maybe = user_files::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(maybe.map(file_to_record))
    }

    async fn find_file_by_short_code(&self, code: &ShortCode) -> StorageResult<Option<FileRecord>> {
        let maybe = user_files::Entity::find()
            .filter(user_files::Column::ShortCode.eq(code.as_str()))
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(maybe.map(file_to_record))
    }

    async fn list_files_for_user(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> StorageResult<Vec<FileRecord>> {
        let mut query = user_files::Entity::find().filter(user_files::Column::UserId.eq(user_id));
        if active_only {
            query = query.filter(user_files::Column::IsActive.eq(true));
        }
        let rows = newest_first(query)
            .all(self.connection())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(file_to_record).collect())
    }

    async fn list_all_files(&self) -> StorageResult<Vec<FileWithOwner>> {
        let rows = newest_first(user_files::Entity::find())
            .all(self.connection())
            .await
            .map_err(db_error)?;
        let usernames = usernames(self.connection()).await?;
        Ok(rows
            .into_iter()
            .map(|model| FileWithOwner {
                owner_username: usernames.get(&model.user_id).cloned().unwrap_or_default(),
                file: file_to_record(model),
            })
            .collect())
    }

    async fn update_file(
        &self,
        id: FileId,
        owner: Option<UserId>,
        update: FileUpdate,
    ) -> StorageResult<Option<FileRecord>> {
        let mut query = user_files::Entity::find_by_id(id);
        if let Some(owner) = owner {
            query = query.filter(user_files::Column::UserId.eq(owner));
        }
        let Some(model) = query.one(self.connection()).await.map_err(db_error)? else {
            return Ok(None);
        };

        let mut active: user_files::ActiveModel = model.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(thumbnail_url) = update.thumbnail_url {
            active.thumbnail_url = Set(thumbnail_url);
        }
        if let Some(allow_download) = update.allow_download {
            active.allow_download = Set(allow_download);
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(self.connection()).await.map_err(db_error)?;
        Ok(Some(file_to_record(updated)))
    }

    async fn delete_file(&self, id: FileId, owner: Option<UserId>) -> StorageResult<bool> {
        let txn = self.connection().begin().await.map_err(db_error)?;
        let mut query = user_files::Entity::find_by_id(id);
        if let Some(owner) = owner {
            query = query.filter(user_files::Column::UserId.eq(owner));
        }
        if query.one(&txn).await.map_err(db_error)?.is_none() {
            return Ok(false);
        }

        file_views::Entity::delete_many()
            .filter(file_views::Column::FileId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        file_downloads::Entity::delete_many()
            .filter(file_downloads::Column::FileId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        user_files::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;
        Ok(true)
    }

    async fn activity_report(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> StorageResult<ActivityReport> {
        let files = user_files::Entity::find()
            .filter(user_files::Column::UserId.eq(user_id))
            .all(self.connection())
            .await
            .map_err(db_error)?;

        let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
        for file in &files {
            let day = file.created_at.date_naive();
            if day >= since {
                days.entry(day).or_default().uploads += 1;
            }
        }

        let ids: Vec<i64> = files.iter().map(|file| file.id).collect();
        if !ids.is_empty() {
            let views = file_views::Entity::find()
                .select_only()
                .column(file_views::Column::AccessDay)
                .column_as(file_views::Column::Id.count(), "hits")
                .filter(file_views::Column::FileId.is_in(ids.clone()))
                .filter(file_views::Column::AccessDay.gte(since))
                .group_by(file_views::Column::AccessDay)
                .into_tuple::<(NaiveDate, i64)>()
                .all(self.connection())
                .await
                .map_err(db_error)?;
            for (day, hits) in views {
                days.entry(day).or_default().views += hits.max(0) as u64;
            }

            let downloads = file_downloads::Entity::find()
                .select_only()
                .column(file_downloads::Column::AccessDay)
                .column_as(file_downloads::Column::Id.count(), "hits")
                .filter(file_downloads::Column::FileId.is_in(ids))
                .filter(file_downloads::Column::AccessDay.gte(since))
                .group_by(file_downloads::Column::AccessDay)
                .into_tuple::<(NaiveDate, i64)>()
                .all(self.connection())
                .await
                .map_err(db_error)?;
            for (day, hits) in downloads {
                days.entry(day).or_default().downloads += hits.max(0) as u64;
            }
        }

        Ok(ActivityReport {
            days: days.into_iter().collect(),
            total_downloads: files.iter().map(|file| file.downloads).sum(),
            total_download_earnings: files
                .iter()
                .map(|file| Money::from_micros(file.download_earnings))
                .sum(),
        })
    }

    async fn platform_stats(&self) -> StorageResult<PlatformStats> {
        let db = self.connection();
        let total_users = users::Entity::find().count(db).await.map_err(db_error)?;
        let total_files = user_files::Entity::find()
            .count(db)
            .await
            .map_err(db_error)?;

        Ok(PlatformStats {
            total_users,
            total_files,
            total_views: sum_column(db, user_files::Entity::find(), user_files::Column::Views)
                .await?,
            total_downloads: sum_column(
                db,
                user_files::Entity::find(),
                user_files::Column::Downloads,
            )
            .await?,
            total_earnings: Money::from_micros(
                sum_column(db, user_files::Entity::find(), user_files::Column::Earnings).await?,
            ),
            total_paid: Money::from_micros(
                sum_column(db, users::Entity::find(), users::Column::PaidEarnings).await?,
            ),
            pending_withdrawals: Money::from_micros(
                sum_column(
                    db,
                    withdrawals::Entity::find().filter(
                        withdrawals::Column::Status.eq(WithdrawalStatusDb::Pending),
                    ),
                    withdrawals::Column::Amount,
                )
                .await?,
            ),
        })
    }
}

fn newest_first(query: Select<user_files::Entity>) -> Select<user_files::Entity> {
    query
        .order_by_desc(user_files::Column::CreatedAt)
        .order_by_desc(user_files::Column::Id)
}

pub(crate) async fn usernames<C: ConnectionTrait>(db: &C) -> StorageResult<HashMap<i64, String>> {
    let rows = users::Entity::find()
        .select_only()
        .column(users::Column::Id)
        .column(users::Column::Username)
        .into_tuple::<(i64, String)>()
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().collect())
}

/// `SUM` over a BIGINT column, cast back to BIGINT (PostgreSQL widens it to
/// NUMERIC); an empty set yields zero.
pub(crate) async fn sum_column<E, C, Col>(db: &C, query: Select<E>, column: Col) -> StorageResult<i64>
where
    E: EntityTrait,
    C: ConnectionTrait,
    Col: ColumnTrait,
{
    let total = query
        .select_only()
        .column_as(
            Expr::expr(Func::cast_as(
                Func::sum(Expr::col(column)),
                Alias::new("BIGINT"),
            )),
            "total",
        )
        .into_tuple::<Option<i64>>()
        .one(db)
        .await
        .map_err(db_error)?;
    Ok(total.flatten().unwrap_or(0))
}

pub(crate) fn file_to_record(model: user_files::Model) -> FileRecord {
    FileRecord {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        description: model.description,
        file_type: model.file_type.into(),
        short_code: ShortCode::new_unchecked(model.short_code),
        file_url: model.file_url,
        thumbnail_url: model.thumbnail_url,
        counters: FileCounters {
            views: model.views,
            unique_views: model.unique_views,
            downloads: model.downloads,
            unique_downloads: model.unique_downloads,
        },
        earnings: Money::from_micros(model.earnings),
        download_earnings: Money::from_micros(model.download_earnings),
        allow_download: model.allow_download,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}
