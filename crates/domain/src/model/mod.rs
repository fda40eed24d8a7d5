//! Data structures shared across the API and storage crates.

mod money;

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use thiserror::Error;

pub use money::{Money, MoneyParseError, MICROS_PER_UNIT, MONEY_SCALE};

/// Length of the public short code handed out for each upload.
pub const SHORT_CODE_LENGTH: usize = 8;
/// Alphabet short codes are drawn from.
pub const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Stored user agents are truncated to this many characters.
pub const USER_AGENT_MAX_CHARS: usize = 500;

pub const DEFAULT_BRAND_NAME: &str = "My Drive";
pub const DEFAULT_FILE_TITLE: &str = "Untitled";
pub const DEFAULT_PAYMENT_METHOD: &str = "UPI/PayPal";
pub const DEFAULT_BOT_ICON: &str = "link-2";

pub type UserId = i64;
pub type FileId = i64;
pub type WithdrawalId = i64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShortCodeError {
    #[error("short code must be exactly {SHORT_CODE_LENGTH} characters")]
    WrongLength,
    #[error("short code may only contain A-Z and 0-9")]
    InvalidCharacter,
}

/// Public lookup key of a file, e.g. `AB12CD34`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    pub fn parse(raw: &str) -> Result<Self, ShortCodeError> {
        let trimmed = raw.trim();
        if trimmed.chars().count() != SHORT_CODE_LENGTH {
            return Err(ShortCodeError::WrongLength);
        }
        let canonical = trimmed.to_ascii_uppercase();
        if !canonical.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b)) {
            return Err(ShortCodeError::InvalidCharacter);
        }
        Ok(Self(canonical))
    }

    /// Wraps a value that already came out of storage or the generator.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileType {
    Video,
    Image,
    Other,
}

impl FileType {
    pub fn is_video(self) -> bool {
        matches!(self, FileType::Video)
    }
}

/// The two independent access logs kept per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AccessKind {
    View,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub brand_name: String,
    pub phone: String,
    pub telegram_channel: Option<String>,
    pub support_link: Option<String>,
    pub allow_download: bool,
    pub email_verified: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub balances: Balances,
    pub created_at: DateTime<Utc>,
}

/// Earnings columns carried on the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub pending_earnings: Money,
    pub paid_earnings: Money,
    pub total_earnings: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_superuser: bool,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub brand_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_channel: Option<Option<String>>,
    pub support_link: Option<Option<String>>,
    pub allow_download: Option<bool>,
}

/// Per-user row in the admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub user: UserRecord,
    pub file_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounters {
    pub views: i64,
    pub unique_views: i64,
    pub downloads: i64,
    pub unique_downloads: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub file_type: FileType,
    pub short_code: ShortCode,
    pub file_url: String,
    pub thumbnail_url: String,
    pub counters: FileCounters,
    pub earnings: Money,
    pub download_earnings: Money,
    pub allow_download: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub file_type: FileType,
    pub file_url: String,
    pub thumbnail_url: String,
    pub allow_download: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub allow_download: Option<bool>,
    pub is_active: Option<bool>,
}

/// Admin listing row: the file plus its owner's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWithOwner {
    pub file: FileRecord,
    pub owner_username: String,
}

/// Counted access rows per UTC day, used by the analytics dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyActivity {
    pub uploads: u64,
    pub views: u64,
    pub downloads: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityReport {
    pub days: Vec<(NaiveDate, DailyActivity)>,
    pub total_downloads: i64,
    pub total_download_earnings: Money,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Paid,
    Rejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRecord {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub amount: Money,
    pub payment_method: String,
    pub payment_details: String,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalWithOwner {
    pub withdrawal: WithdrawalRecord,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawal {
    pub user_id: UserId,
    pub amount: Money,
    pub payment_method: String,
    pub payment_details: String,
    pub requested_at: DateTime<Utc>,
}

/// Platform-wide totals for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_files: u64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub total_earnings: Money,
    pub total_paid: Money,
    pub pending_withdrawals: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotLinkRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub telegram_username: String,
    pub telegram_link: String,
    pub icon: String,
    pub display_order: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBotLink {
    pub name: String,
    pub description: String,
    pub telegram_username: String,
    pub telegram_link: String,
    pub icon: String,
    pub display_order: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotLinkUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub telegram_username: Option<String>,
    pub telegram_link: Option<String>,
    pub icon: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
    pub is_active: Option<bool>,
}

/// Truncates a client-supplied user agent to the stored column width.
pub fn truncate_user_agent(raw: &str) -> String {
    raw.chars().take(USER_AGENT_MAX_CHARS).collect()
}

/// What an emailed one-time code unlocks; each purpose keeps its own
/// outstanding code per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

/// Superuser actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AdminAction {
    ApproveWithdrawal,
    RejectWithdrawal,
    ManualPayout,
    BanUser,
    UnbanUser,
    DeleteFile,
    UpdateSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdminLog {
    /// `None` for actions taken by the system itself.
    pub admin_id: Option<UserId>,
    pub action: AdminAction,
    pub target: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminLogRecord {
    pub id: i64,
    pub admin_id: Option<UserId>,
    /// Resolved at read time; `None` when the actor is gone or was the system.
    pub admin_username: Option<String>,
    pub action: String,
    pub target: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn short_code_parse_canonicalizes_case() {
        let code = ShortCode::parse("ab12cd34").unwrap();
        assert_eq!(code.as_str(), "AB12CD34");
    }

    #[test]
    fn short_code_rejects_invalid_inputs() {
        assert_eq!(ShortCode::parse("ABC"), Err(ShortCodeError::WrongLength));
        assert_eq!(
            ShortCode::parse("AB12CD3!"),
            Err(ShortCodeError::InvalidCharacter)
        );
    }

    #[test]
    fn file_type_round_trips_through_strum() {
        assert_eq!(FileType::from_str("video").unwrap(), FileType::Video);
        assert_eq!(FileType::Image.as_ref(), "image");
        assert!(FileType::from_str("psd").is_err());
    }

    #[test]
    fn admin_actions_are_stored_in_snake_case() {
        assert_eq!(AdminAction::ApproveWithdrawal.as_ref(), "approve_withdrawal");
        assert_eq!(
            "update_settings".parse::<AdminAction>(),
            Ok(AdminAction::UpdateSettings)
        );
        assert_eq!(OtpPurpose::PasswordReset.as_ref(), "password_reset");
    }

    #[test]
    fn withdrawal_terminal_states() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(WithdrawalStatus::Paid.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
    }

    #[test]
    fn user_agent_is_truncated() {
        let long = "x".repeat(USER_AGENT_MAX_CHARS + 20);
        assert_eq!(truncate_user_agent(&long).len(), USER_AGENT_MAX_CHARS);
    }
}
