use chrono::{DateTime, Utc};
use diskwala_domain::model::{
    BotLinkRecord, BotLinkUpdate, NewBotLink, NewNotification, NotificationRecord,
    NotificationUpdate,
};
use diskwala_domain::storage::{ContentStore, StorageResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entity::{bot_links, notifications};
use crate::errors::db_error;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl ContentStore for SeaOrmStorage {
    async fn list_bot_links(&self, active_only: bool) -> StorageResult<Vec<BotLinkRecord>> {
        let mut query = bot_links::Entity::find();
        if active_only {
            query = query.filter(bot_links::Column::IsActive.eq(true));
        }
        let rows = query
            .order_by_asc(bot_links::Column::DisplayOrder)
            .order_by_asc(bot_links::Column::Name)
            .all(self.connection())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(bot_link_to_record).collect())
    }

    async fn insert_bot_link(&self, link: NewBotLink) -> StorageResult<BotLinkRecord> {
        let created = bot_links::ActiveModel {
            name: Set(link.name),
            description: Set(link.description),
            telegram_username: Set(link.telegram_username),
            telegram_link: Set(link.telegram_link),
            icon: Set(link.icon),
            display_order: Set(link.display_order),
            is_active: Set(link.is_active),
            ..Default::default()
        }
        .insert(self.connection())
        .await
        .map_err(db_error)?;
        Ok(bot_link_to_record(created))
    }

    async fn update_bot_link(
        &self,
        id: i64,
        update: BotLinkUpdate,
    ) -> StorageResult<Option<BotLinkRecord>> {
        let Some(model) = bot_links::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let mut active: bot_links::ActiveModel = model.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(username) = update.telegram_username {
            active.telegram_username = Set(username);
        }
        if let Some(link) = update.telegram_link {
            active.telegram_link = Set(link);
        }
        if let Some(icon) = update.icon {
            active.icon = Set(icon);
        }
        if let Some(order) = update.display_order {
            active.display_order = Set(order);
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
        }
        let updated = active.update(self.connection()).await.map_err(db_error)?;
        Ok(Some(bot_link_to_record(updated)))
    }

    async fn delete_bot_link(&self, id: i64) -> StorageResult<bool> {
        let result = bot_links::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    async fn list_notifications(&self) -> StorageResult<Vec<NotificationRecord>> {
        let rows = notifications::Entity::find()
            .order_by_desc(notifications::Column::CreatedAt)
            .order_by_desc(notifications::Column::Id)
            .all(self.connection())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(notification_to_record).collect())
    }

    async fn active_notification(&self) -> StorageResult<Option<NotificationRecord>> {
        let maybe = notifications::Entity::find()
            .filter(notifications::Column::IsActive.eq(true))
            .order_by_desc(notifications::Column::CreatedAt)
            .order_by_desc(notifications::Column::Id)
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(maybe.map(notification_to_record))
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
        created_at: DateTime<Utc>,
    ) -> StorageResult<NotificationRecord> {
        let created = notifications::ActiveModel {
            title: Set(notification.title),
            message: Set(notification.message),
            is_active: Set(notification.is_active),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(self.connection())
        .await
        .map_err(db_error)?;
        Ok(notification_to_record(created))
    }

    async fn update_notification(
        &self,
        id: i64,
        update: NotificationUpdate,
    ) -> StorageResult<Option<NotificationRecord>> {
        let Some(model) = notifications::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let mut active: notifications::ActiveModel = model.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(message) = update.message {
            active.message = Set(message);
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
        }
        let updated = active.update(self.connection()).await.map_err(db_error)?;
        Ok(Some(notification_to_record(updated)))
    }

    async fn delete_notification(&self, id: i64) -> StorageResult<bool> {
        let result = notifications::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }
}

fn bot_link_to_record(model: bot_links::Model) -> BotLinkRecord {
    BotLinkRecord {
        id: model.id,
        name: model.name,
        description: model.description,
        telegram_username: model.telegram_username,
        telegram_link: model.telegram_link,
        icon: model.icon,
        display_order: model.display_order,
        is_active: model.is_active,
    }
}

fn notification_to_record(model: notifications::Model) -> NotificationRecord {
    NotificationRecord {
        id: model.id,
        title: model.title,
        message: model.message,
        is_active: model.is_active,
        created_at: model.created_at,
    }
}
