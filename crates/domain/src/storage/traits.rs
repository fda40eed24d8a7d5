use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::accrual::{AccessEvent, AccrualDelta};
use crate::model::{
    ActivityReport, AdminLogRecord, NewAdminLog, OtpPurpose, BotLinkRecord, BotLinkUpdate, FileId, FileRecord, FileUpdate, FileWithOwner,
    Money, NewBotLink, NewFile, NewNotification, NewUser, NewWithdrawal, NotificationRecord,
    NotificationUpdate, PlatformStats, ProfileUpdate, ShortCode, UserId, UserRecord, UserSummary,
    WithdrawalId, WithdrawalRecord, WithdrawalWithOwner,
};
use crate::settings::{SettingsUpdate, SiteSettings};
use crate::withdrawal::LedgerError;

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("conflicting record: {0}")]
    Conflict(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StorageResult<UserRecord>;
    async fn find_user(&self, id: UserId) -> StorageResult<Option<UserRecord>>;
    /// Case-insensitive lookup.
    async fn find_user_by_username(&self, username: &str) -> StorageResult<Option<UserRecord>>;
    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>>;
    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> StorageResult<Option<UserRecord>>;
    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> StorageResult<bool>;
    /// Replaces the email and clears the verified flag.
    async fn set_email(&self, id: UserId, email: &str) -> StorageResult<bool>;
    async fn mark_email_verified(&self, id: UserId) -> StorageResult<bool>;
    async fn set_user_active(&self, id: UserId, active: bool) -> StorageResult<Option<UserRecord>>;
    async fn list_users(&self) -> StorageResult<Vec<UserSummary>>;
}

#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    async fn insert_auth_token(
        &self,
        token_hash: &str,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> StorageResult<()>;
    async fn find_user_by_token(&self, token_hash: &str) -> StorageResult<Option<UserRecord>>;
    /// Drops every token issued to the user; returns how many were removed.
    async fn revoke_user_tokens(&self, user_id: UserId) -> StorageResult<u64>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Replaces any outstanding code for the user and purpose.
    async fn upsert_otp(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;
    /// Removes and returns the outstanding code, if any.
    async fn take_otp(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
    ) -> StorageResult<Option<(String, DateTime<Utc>)>>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Inserts with the given short code; a taken code surfaces as
    /// [`StorageError::Conflict`].
    async fn insert_file(&self, file: NewFile, short_code: ShortCode) -> StorageResult<FileRecord>;
    async fn find_file(&self, id: FileId) -> StorageResult<Option<FileRecord>>;
    async fn find_file_by_short_code(&self, code: &ShortCode) -> StorageResult<Option<FileRecord>>;
    async fn list_files_for_user(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> StorageResult<Vec<FileRecord>>;
    async fn list_all_files(&self) -> StorageResult<Vec<FileWithOwner>>;
    /// Applies the update only when the file belongs to `owner`.
    async fn update_file(
        &self,
        id: FileId,
        owner: Option<UserId>,
        update: FileUpdate,
    ) -> StorageResult<Option<FileRecord>>;
    /// Deletes the file and its access logs; `owner` restricts the delete.
    async fn delete_file(&self, id: FileId, owner: Option<UserId>) -> StorageResult<bool>;
    async fn activity_report(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> StorageResult<ActivityReport>;
    async fn platform_stats(&self) -> StorageResult<PlatformStats>;
}

/// Result of a counted public access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub file: FileRecord,
    pub delta: AccrualDelta,
    pub should_download: bool,
}

#[async_trait]
pub trait AccrualStore: Send + Sync {
    /// Counts one public access in a single transaction covering the access
    /// logs, the file row and the owner's balances. `Ok(None)` when the code
    /// is unknown or the file is inactive; nothing is written in that case.
    async fn record_access(
        &self,
        event: AccessEvent,
        settings: &SiteSettings,
    ) -> StorageResult<Option<AccessOutcome>>;
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Validates against `settings.min_withdrawal` and the withdrawable
    /// balance, inserts a pending record and holds the amount.
    async fn request_withdrawal(
        &self,
        request: NewWithdrawal,
        settings: &SiteSettings,
    ) -> Result<WithdrawalRecord, LedgerError>;
    async fn approve_withdrawal(
        &self,
        id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<WithdrawalRecord, LedgerError>;
    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<WithdrawalRecord, LedgerError>;
    async fn manual_payout(&self, user_id: UserId, amount: Money)
        -> Result<UserRecord, LedgerError>;
    async fn withdrawable_balance(&self, user_id: UserId) -> StorageResult<Money>;
    async fn list_withdrawals_for_user(
        &self,
        user_id: UserId,
    ) -> StorageResult<Vec<WithdrawalRecord>>;
    async fn list_all_withdrawals(&self) -> StorageResult<Vec<WithdrawalWithOwner>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the singleton row, creating it with defaults when absent.
    async fn load_settings(&self) -> StorageResult<SiteSettings>;
    async fn update_settings(&self, update: SettingsUpdate) -> StorageResult<SiteSettings>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_bot_links(&self, active_only: bool) -> StorageResult<Vec<BotLinkRecord>>;
    async fn insert_bot_link(&self, link: NewBotLink) -> StorageResult<BotLinkRecord>;
    async fn update_bot_link(
        &self,
        id: i64,
        update: BotLinkUpdate,
    ) -> StorageResult<Option<BotLinkRecord>>;
    async fn delete_bot_link(&self, id: i64) -> StorageResult<bool>;

    async fn list_notifications(&self) -> StorageResult<Vec<NotificationRecord>>;
    async fn active_notification(&self) -> StorageResult<Option<NotificationRecord>>;
    async fn insert_notification(
        &self,
        notification: NewNotification,
        created_at: DateTime<Utc>,
    ) -> StorageResult<NotificationRecord>;
    async fn update_notification(
        &self,
        id: i64,
        update: NotificationUpdate,
    ) -> StorageResult<Option<NotificationRecord>>;
    async fn delete_notification(&self, id: i64) -> StorageResult<bool>;
}

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append_admin_log(&self, entry: NewAdminLog) -> StorageResult<AdminLogRecord>;
    /// Newest first, at most `limit` entries.
    async fn recent_admin_logs(&self, limit: u64) -> StorageResult<Vec<AdminLogRecord>>;
}
