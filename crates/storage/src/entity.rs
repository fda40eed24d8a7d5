//! Monetary columns hold signed micro-units (`Money::micros`).

pub mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub username: String,
        /// Lowercased username; carries the unique index.
        #[sea_orm(unique)]
        pub username_key: String,
        pub email: String,
        #[sea_orm(unique)]
        pub email_key: String,
        pub password_hash: String,
        pub brand_name: String,
        pub phone: String,
        pub telegram_channel: Option<String>,
        pub support_link: Option<String>,
        pub allow_download: bool,
        pub email_verified: bool,
        pub is_superuser: bool,
        pub is_active: bool,
        pub pending_earnings: i64,
        pub paid_earnings: i64,
        pub total_earnings: i64,
        pub created_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod user_files {
    use diskwala_domain::model::FileType;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "user_files")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: i64,
        pub title: String,
        pub description: String,
        pub file_type: FileTypeDb,
        #[sea_orm(unique)]
        pub short_code: String,
        pub file_url: String,
        pub thumbnail_url: String,
        pub views: i64,
        pub unique_views: i64,
        pub downloads: i64,
        pub unique_downloads: i64,
        pub earnings: i64,
        pub download_earnings: i64,
        pub allow_download: bool,
        pub is_active: bool,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
    pub enum FileTypeDb {
        #[sea_orm(string_value = "video")]
        Video,
        #[sea_orm(string_value = "image")]
        Image,
        #[sea_orm(string_value = "other")]
        Other,
    }

    impl From<FileType> for FileTypeDb {
        fn from(value: FileType) -> Self {
            match value {
                FileType::Video => FileTypeDb::Video,
                FileType::Image => FileTypeDb::Image,
                FileType::Other => FileTypeDb::Other,
            }
        }
    }

    impl From<FileTypeDb> for FileType {
        fn from(value: FileTypeDb) -> Self {
            match value {
                FileTypeDb::Video => FileType::Video,
                FileTypeDb::Image => FileType::Image,
                FileTypeDb::Other => FileType::Other,
            }
        }
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// One row per counted view; (file_id, ip_address, access_day) is unique.
pub mod file_views {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "file_views")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub file_id: i64,
        pub ip_address: String,
        pub user_agent: String,
        pub access_day: Date,
        pub accessed_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Same ledger for downloads, kept independent from views.
pub mod file_downloads {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "file_downloads")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub file_id: i64,
        pub ip_address: String,
        pub user_agent: String,
        pub access_day: Date,
        pub accessed_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod withdrawals {
    use diskwala_domain::model::WithdrawalStatus;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "withdrawals")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: i64,
        pub amount: i64,
        pub payment_method: String,
        pub payment_details: String,
        pub status: WithdrawalStatusDb,
        pub requested_at: DateTimeUtc,
        pub processed_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
    pub enum WithdrawalStatusDb {
        #[sea_orm(string_value = "pending")]
        Pending,
        #[sea_orm(string_value = "paid")]
        Paid,
        #[sea_orm(string_value = "rejected")]
        Rejected,
    }

    impl From<WithdrawalStatusDb> for WithdrawalStatus {
        fn from(value: WithdrawalStatusDb) -> Self {
            match value {
                WithdrawalStatusDb::Pending => WithdrawalStatus::Pending,
                WithdrawalStatusDb::Paid => WithdrawalStatus::Paid,
                WithdrawalStatusDb::Rejected => WithdrawalStatus::Rejected,
            }
        }
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod site_settings {
    use diskwala_domain::rates::EarningPolicy;
    use sea_orm::entity::prelude::*;

    /// Key of the only row.
    pub const SINGLETON_ID: i32 = 1;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "site_settings")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub earning_per_view: i64,
        pub earning_per_1000_views: i64,
        pub earning_per_1000_downloads: i64,
        pub earning_policy: EarningPolicyDb,
        pub min_withdrawal: i64,
        pub site_name: String,
        pub admob_banner_id: String,
        pub admob_interstitial_id: String,
        pub meta_banner_placement_id: String,
        pub meta_interstitial_placement_id: String,
        pub seo_title: String,
        pub seo_description: String,
        pub seo_keywords: String,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
    pub enum EarningPolicyDb {
        #[sea_orm(string_value = "per_event")]
        PerEvent,
        #[sea_orm(string_value = "per_thousand")]
        PerThousand,
        #[sea_orm(string_value = "tiered")]
        Tiered,
    }

    impl From<EarningPolicy> for EarningPolicyDb {
        fn from(value: EarningPolicy) -> Self {
            match value {
                EarningPolicy::PerEvent => EarningPolicyDb::PerEvent,
                EarningPolicy::PerThousand => EarningPolicyDb::PerThousand,
                EarningPolicy::Tiered => EarningPolicyDb::Tiered,
            }
        }
    }

    impl From<EarningPolicyDb> for EarningPolicy {
        fn from(value: EarningPolicyDb) -> Self {
            match value {
                EarningPolicyDb::PerEvent => EarningPolicy::PerEvent,
                EarningPolicyDb::PerThousand => EarningPolicy::PerThousand,
                EarningPolicyDb::Tiered => EarningPolicy::Tiered,
            }
        }
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod auth_tokens {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "auth_tokens")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub token_hash: String,
        pub user_id: i64,
        pub created_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod email_otps {
    use sea_orm::entity::prelude::*;

    /// One outstanding code per (user, purpose); `purpose` holds
    /// `OtpPurpose::as_ref()`.
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "email_otps")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub purpose: String,
        pub code_hash: String,
        pub expires_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod bot_links {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "bot_links")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub description: String,
        pub telegram_username: String,
        pub telegram_link: String,
        pub icon: String,
        pub display_order: i32,
        pub is_active: bool,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod notifications {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "notifications")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub title: String,
        pub message: String,
        pub is_active: bool,
        pub created_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Append-only record of superuser actions.
pub mod admin_logs {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "admin_logs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub admin_id: Option<i64>,
        pub action: String,
        pub target: String,
        pub details: String,
        pub created_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
