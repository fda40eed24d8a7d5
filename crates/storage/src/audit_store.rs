use std::collections::HashMap;

use diskwala_domain::model::{AdminLogRecord, NewAdminLog};
use diskwala_domain::storage::{AuditLogStore, StorageResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entity::{admin_logs, users};
use crate::errors::db_error;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl AuditLogStore for SeaOrmStorage {
    async fn append_admin_log(&self, entry: NewAdminLog) -> StorageResult<AdminLogRecord> {
        let created = admin_logs::ActiveModel {
            admin_id: Set(entry.admin_id),
            action: Set(entry.action.as_ref().to_string()),
            target: Set(entry.target),
            details: Set(entry.details),
            created_at: Set(entry.created_at),
            ..Default::default()
        }
        .insert(self.connection())
        .await
        .map_err(db_error)?;

        let admin_username = match created.admin_id {
            Some(admin_id) => users::Entity::find_by_id(admin_id)
                .one(self.connection())
                .await
                .map_err(db_error)?
                .map(|user| user.username),
            None => None,
        };
        Ok(log_to_record(created, admin_username))
    }

    async fn recent_admin_logs(&self, limit: u64) -> StorageResult<Vec<AdminLogRecord>> {
        let rows = admin_logs::Entity::find()
            .order_by_desc(admin_logs::Column::CreatedAt)
            .order_by_desc(admin_logs::Column::Id)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(db_error)?;

        let mut admin_ids: Vec<i64> = rows.iter().filter_map(|row| row.admin_id).collect();
        admin_ids.sort_unstable();
        admin_ids.dedup();
        let names: HashMap<i64, String> = if admin_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .select_only()
                .column(users::Column::Id)
                .column(users::Column::Username)
                .filter(users::Column::Id.is_in(admin_ids))
                .into_tuple::<(i64, String)>()
                .all(self.connection())
                .await
                .map_err(db_error)?
                .into_iter()
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let admin_username = row.admin_id.and_then(|id| names.get(&id).cloned());
                log_to_record(row, admin_username)
            })
            .collect())
    }
}

fn log_to_record(model: admin_logs::Model, admin_username: Option<String>) -> AdminLogRecord {
    AdminLogRecord {
        id: model.id,
        admin_id: model.admin_id,
        admin_username,
        action: model.action,
        target: model.target,
        details: model.details,
        created_at: model.created_at,
    }
}
