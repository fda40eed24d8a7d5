use chrono::{DateTime, Utc};
use diskwala_domain::model::{OtpPurpose, UserId, UserRecord};
use diskwala_domain::storage::{AuthTokenStore, OtpStore, StorageResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::entity::{auth_tokens, email_otps, users};
use crate::errors::db_error;
use crate::user_store::user_to_record;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl AuthTokenStore for SeaOrmStorage {
    async fn insert_auth_token(
        &self,
        token_hash: &str,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let model = auth_tokens::ActiveModel {
            token_hash: Set(token_hash.to_string()),
            user_id: Set(user_id),
            created_at: Set(issued_at),
        };
        model.insert(self.connection()).await.map_err(db_error)?;
        Ok(())
    }

    async fn find_user_by_token(&self, token_hash: &str) -> StorageResult<Option<UserRecord>> {
        let Some(token) = auth_tokens::Entity::find_by_id(token_hash.to_string())
            .one(self.connection())
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let user = users::Entity::find_by_id(token.user_id)
            .one(self.connection())
            .await
            .map_err(db_error)?;
        Ok(user.map(user_to_record))
    }

    async fn revoke_user_tokens(&self, user_id: UserId) -> StorageResult<u64> {
        let deleted = auth_tokens::Entity::delete_many()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .exec(self.connection())
            .await
            .map_err(db_error)?;
        Ok(deleted.rows_affected)
    }
}

#[async_trait::async_trait]
impl OtpStore for SeaOrmStorage {
    async fn upsert_otp(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let model = email_otps::ActiveModel {
            user_id: Set(user_id),
            purpose: Set(purpose.as_ref().to_string()),
            code_hash: Set(code_hash.to_string()),
            expires_at: Set(expires_at),
        };
        email_otps::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([email_otps::Column::UserId, email_otps::Column::Purpose])
                    .update_columns([email_otps::Column::CodeHash, email_otps::Column::ExpiresAt])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn take_otp(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
    ) -> StorageResult<Option<(String, DateTime<Utc>)>> {
        let txn = self.connection().begin().await.map_err(db_error)?;
        let Some(otp) = email_otps::Entity::find()
            .filter(email_otps::Column::UserId.eq(user_id))
            .filter(email_otps::Column::Purpose.eq(purpose.as_ref()))
            .one(&txn)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let deleted = email_otps::Entity::delete_many()
            .filter(email_otps::Column::UserId.eq(user_id))
            .filter(email_otps::Column::Purpose.eq(purpose.as_ref()))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        // A concurrent verifier already consumed it.
        if deleted.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some((otp.code_hash, otp.expires_at)))
    }
}
