use std::collections::HashMap;

use chrono::Utc;
use diskwala_domain::model::{
    Balances, Money, NewUser, ProfileUpdate, UserId, UserRecord, UserSummary, DEFAULT_BRAND_NAME,
};
use diskwala_domain::storage::{StorageResult, UserStore};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entity::{user_files, users};
use crate::errors::db_error;
use crate::SeaOrmStorage;

/// Lookup key for the case-insensitive username and email indexes.
pub(crate) fn lookup_key(value: &str) -> String {
    value.trim().to_lowercase()
}

#[async_trait::async_trait]
impl UserStore for SeaOrmStorage {
    async fn insert_user(&self, user: NewUser) -> StorageResult<UserRecord> {
        let model = users::ActiveModel {
            username_key: Set(lookup_key(&user.username)),
            username: Set(user.username.trim().to_string()),
            email_key: Set(lookup_key(&user.email)),
            email: Set(user.email.trim().to_string()),
            password_hash: Set(user.password_hash),
            brand_name: Set(DEFAULT_BRAND_NAME.to_string()),
            phone: Set(String::new()),
            telegram_channel: Set(None),
            support_link: Set(None),
            allow_download: Set(true),
            email_verified: Set(user.email_verified),
            is_superuser: Set(user.is_superuser),
            is_active: Set(true),
            pending_earnings: Set(0),
            paid_earnings: Set(0),
            total_earnings: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let created = model.insert(self.connection()).await.map_err(db_error)?;
        Ok(user_to_record(created))
    }

    async fn find_user(&self, id: UserId) -> StorageResult<Option<UserRecord>> {
        let maybe = users::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(maybe.map(user_to_record))
    }

    async fn find_user_by_username(&self, username: &str) -> StorageResult<Option<UserRecord>> {
        let maybe = users::Entity::find()
            .filter(users::Column::UsernameKey.eq(lookup_key(username)))
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(maybe.map(user_to_record))
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let maybe = users::Entity::find()
            .filter(users::Column::EmailKey.eq(lookup_key(email)))
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(maybe.map(user_to_record))
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> StorageResult<Option<UserRecord>> {
        let Some(model) = users::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = model.into();
        if let Some(brand_name) = update.brand_name {
            active.brand_name = Set(brand_name.trim().to_string());
        }
        if let Some(phone) = update.phone {
            active.phone = Set(phone.trim().to_string());
        }
        if let Some(channel) = update.telegram_channel {
            active.telegram_channel = Set(non_blank(channel));
        }
        if let Some(link) = update.support_link {
            active.support_link = Set(non_blank(link));
        }
        if let Some(allow) = update.allow_download {
            active.allow_download = Set(allow);
        }
        let updated = active.update(self.connection()).await.map_err(db_error)?;
        Ok(Some(user_to_record(updated)))
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> StorageResult<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .filter(users::Column::Id.eq(id))
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    async fn set_email(&self, id: UserId, email: &str) -> StorageResult<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Email, Expr::value(email.trim()))
            .col_expr(users::Column::EmailKey, Expr::value(lookup_key(email)))
            .col_expr(users::Column::EmailVerified, Expr::value(false))
            .filter(users::Column::Id.eq(id))
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_email_verified(&self, id: UserId) -> StorageResult<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::EmailVerified, Expr::value(true))
            .filter(users::Column::Id.eq(id))
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> StorageResult<Option<UserRecord>> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::IsActive, Expr::value(active))
            .filter(users::Column::Id.eq(id))
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_user(id).await
    }

    async fn list_users(&self) -> StorageResult<Vec<UserSummary>> {
        let rows = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .all(self.connection())
            .await
            .map_err(db_error)?;

        let counts: HashMap<i64, i64> = user_files::Entity::find()
            .select_only()
            .column(user_files::Column::UserId)
            .column_as(user_files::Column::Id.count(), "file_count")
            .group_by(user_files::Column::UserId)
            .into_tuple::<(i64, i64)>()
            .all(self.connection())
            .await
            .map_err(db_error)?
            .into_iter()
            .collect();

        Ok(rows
            .into_iter()
            .map(|model| {
                let file_count = counts.get(&model.id).copied().unwrap_or(0).max(0) as u64;
                UserSummary {
                    user: user_to_record(model),
                    file_count,
                }
            })
            .collect())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub(crate) fn user_to_record(model: users::Model) -> UserRecord {
    UserRecord {
        id: model.id,
        username: model.username,
        email: model.email,
        password_hash: model.password_hash,
        brand_name: model.brand_name,
        phone: model.phone,
        telegram_channel: model.telegram_channel,
        support_link: model.support_link,
        allow_download: model.allow_download,
        email_verified: model.email_verified,
        is_superuser: model.is_superuser,
        is_active: model.is_active,
        balances: Balances {
            pending_earnings: Money::from_micros(model.pending_earnings),
            paid_earnings: Money::from_micros(model.paid_earnings),
            total_earnings: Money::from_micros(model.total_earnings),
        },
        created_at: model.created_at,
    }
}
