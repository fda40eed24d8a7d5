use sea_orm::sea_query::{ColumnDef, Index, IndexCreateStatement, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::{
    admin_logs, auth_tokens, bot_links, email_otps, file_downloads, file_views, notifications, site_settings,
    user_files, users, withdrawals,
};
use crate::errors::db_error;
use diskwala_domain::storage::StorageResult;

fn id_column<C: sea_orm::sea_query::IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn zeroed_column<C: sea_orm::sea_query::IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

fn text_column<C: sea_orm::sea_query::IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column)
        .string()
        .not_null()
        .default("")
        .to_owned()
}

fn flag_column<C: sea_orm::sea_query::IntoIden>(column: C, default: bool) -> ColumnDef {
    ColumnDef::new(column)
        .boolean()
        .not_null()
        .default(default)
        .to_owned()
}

fn timestamp_column<C: sea_orm::sea_query::IntoIden>(column: C) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let users_table = Table::create()
        .table(users::Entity)
        .col(&mut id_column(users::Column::Id))
        .col(ColumnDef::new(users::Column::Username).string_len(150).not_null())
        .col(
            ColumnDef::new(users::Column::UsernameKey)
                .string_len(150)
                .not_null()
                .unique_key(),
        )
        .col(ColumnDef::new(users::Column::Email).string_len(254).not_null())
        .col(
            ColumnDef::new(users::Column::EmailKey)
                .string_len(254)
                .not_null()
                .unique_key(),
        )
        .col(ColumnDef::new(users::Column::PasswordHash).string().not_null())
        .col(&mut text_column(users::Column::BrandName))
        .col(&mut text_column(users::Column::Phone))
        .col(ColumnDef::new(users::Column::TelegramChannel).string().null())
        .col(ColumnDef::new(users::Column::SupportLink).string().null())
        .col(&mut flag_column(users::Column::AllowDownload, true))
        .col(&mut flag_column(users::Column::EmailVerified, false))
        .col(&mut flag_column(users::Column::IsSuperuser, false))
        .col(&mut flag_column(users::Column::IsActive, true))
        .col(&mut zeroed_column(users::Column::PendingEarnings))
        .col(&mut zeroed_column(users::Column::PaidEarnings))
        .col(&mut zeroed_column(users::Column::TotalEarnings))
        .col(&mut timestamp_column(users::Column::CreatedAt))
        .to_owned();
    create_table(db, backend, users_table).await?;

    let files_table = Table::create()
        .table(user_files::Entity)
        .col(&mut id_column(user_files::Column::Id))
        .col(
            ColumnDef::new(user_files::Column::UserId)
                .big_integer()
                .not_null(),
        )
        .col(&mut text_column(user_files::Column::Title))
        .col(&mut text_column(user_files::Column::Description))
        .col(
            ColumnDef::new(user_files::Column::FileType)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(user_files::Column::ShortCode)
                .string_len(8)
                .not_null()
                .unique_key(),
        )
        .col(&mut text_column(user_files::Column::FileUrl))
        .col(&mut text_column(user_files::Column::ThumbnailUrl))
        .col(&mut zeroed_column(user_files::Column::Views))
        .col(&mut zeroed_column(user_files::Column::UniqueViews))
        .col(&mut zeroed_column(user_files::Column::Downloads))
        .col(&mut zeroed_column(user_files::Column::UniqueDownloads))
        .col(&mut zeroed_column(user_files::Column::Earnings))
        .col(&mut zeroed_column(user_files::Column::DownloadEarnings))
        .col(&mut flag_column(user_files::Column::AllowDownload, true))
        .col(&mut flag_column(user_files::Column::IsActive, true))
        .col(&mut timestamp_column(user_files::Column::CreatedAt))
        .col(&mut timestamp_column(user_files::Column::UpdatedAt))
        .to_owned();
    create_table(db, backend, files_table).await?;
    create_index(
        db,
        backend,
        Index::create()
            .name("idx_user_files_user")
            .table(user_files::Entity)
            .col(user_files::Column::UserId)
            .to_owned(),
    )
    .await?;

    let views_table = Table::create()
        .table(file_views::Entity)
        .col(&mut id_column(file_views::Column::Id))
        .col(
            ColumnDef::new(file_views::Column::FileId)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(file_views::Column::IpAddress)
                .string_len(45)
                .not_null(),
        )
        .col(&mut text_column(file_views::Column::UserAgent))
        .col(ColumnDef::new(file_views::Column::AccessDay).date().not_null())
        .col(&mut timestamp_column(file_views::Column::AccessedAt))
        .to_owned();
    create_table(db, backend, views_table).await?;
    create_index(
        db,
        backend,
        Index::create()
            .name("uniq_file_views_daily")
            .table(file_views::Entity)
            .col(file_views::Column::FileId)
            .col(file_views::Column::IpAddress)
            .col(file_views::Column::AccessDay)
            .unique()
            .to_owned(),
    )
    .await?;

    let downloads_table = Table::create()
        .table(file_downloads::Entity)
        .col(&mut id_column(file_downloads::Column::Id))
        .col(
            ColumnDef::new(file_downloads::Column::FileId)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(file_downloads::Column::IpAddress)
                .string_len(45)
                .not_null(),
        )
        .col(&mut text_column(file_downloads::Column::UserAgent))
        .col(
            ColumnDef::new(file_downloads::Column::AccessDay)
                .date()
                .not_null(),
        )
        .col(&mut timestamp_column(file_downloads::Column::AccessedAt))
        .to_owned();
    create_table(db, backend, downloads_table).await?;
    create_index(
        db,
        backend,
        Index::create()
            .name("uniq_file_downloads_daily")
            .table(file_downloads::Entity)
            .col(file_downloads::Column::FileId)
            .col(file_downloads::Column::IpAddress)
            .col(file_downloads::Column::AccessDay)
            .unique()
            .to_owned(),
    )
    .await?;

    let withdrawals_table = Table::create()
        .table(withdrawals::Entity)
        .col(&mut id_column(withdrawals::Column::Id))
        .col(
            ColumnDef::new(withdrawals::Column::UserId)
                .big_integer()
                .not_null(),
        )
        .col(&mut zeroed_column(withdrawals::Column::Amount))
        .col(&mut text_column(withdrawals::Column::PaymentMethod))
        .col(&mut text_column(withdrawals::Column::PaymentDetails))
        .col(
            ColumnDef::new(withdrawals::Column::Status)
                .string_len(16)
                .not_null(),
        )
        .col(&mut timestamp_column(withdrawals::Column::RequestedAt))
        .col(
            ColumnDef::new(withdrawals::Column::ProcessedAt)
                .timestamp_with_time_zone()
                .null(),
        )
        .to_owned();
    create_table(db, backend, withdrawals_table).await?;
    create_index(
        db,
        backend,
        Index::create()
            .name("idx_withdrawals_user")
            .table(withdrawals::Entity)
            .col(withdrawals::Column::UserId)
            .to_owned(),
    )
    .await?;

    let settings_table = Table::create()
        .table(site_settings::Entity)
        .col(
            ColumnDef::new(site_settings::Column::Id)
                .integer()
                .not_null()
                .primary_key(),
        )
        .col(&mut zeroed_column(site_settings::Column::EarningPerView))
        .col(&mut zeroed_column(site_settings::Column::EarningPer1000Views))
        .col(&mut zeroed_column(site_settings::Column::EarningPer1000Downloads))
        .col(
            ColumnDef::new(site_settings::Column::EarningPolicy)
                .string_len(16)
                .not_null(),
        )
        .col(&mut zeroed_column(site_settings::Column::MinWithdrawal))
        .col(&mut text_column(site_settings::Column::SiteName))
        .col(&mut text_column(site_settings::Column::AdmobBannerId))
        .col(&mut text_column(site_settings::Column::AdmobInterstitialId))
        .col(&mut text_column(site_settings::Column::MetaBannerPlacementId))
        .col(&mut text_column(
            site_settings::Column::MetaInterstitialPlacementId,
        ))
        .col(&mut text_column(site_settings::Column::SeoTitle))
        .col(&mut text_column(site_settings::Column::SeoDescription))
        .col(&mut text_column(site_settings::Column::SeoKeywords))
        .to_owned();
    create_table(db, backend, settings_table).await?;

    let tokens_table = Table::create()
        .table(auth_tokens::Entity)
        .col(
            ColumnDef::new(auth_tokens::Column::TokenHash)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(auth_tokens::Column::UserId)
                .big_integer()
                .not_null(),
        )
        .col(&mut timestamp_column(auth_tokens::Column::CreatedAt))
        .to_owned();
    create_table(db, backend, tokens_table).await?;

    let otp_table = Table::create()
        .table(email_otps::Entity)
        .col(
            ColumnDef::new(email_otps::Column::UserId)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(email_otps::Column::Purpose)
                .string_len(32)
                .not_null(),
        )
        .primary_key(
            Index::create()
                .col(email_otps::Column::UserId)
                .col(email_otps::Column::Purpose),
        )
        .col(
            ColumnDef::new(email_otps::Column::CodeHash)
                .string_len(64)
                .not_null(),
        )
        .col(&mut timestamp_column(email_otps::Column::ExpiresAt))
        .to_owned();
    create_table(db, backend, otp_table).await?;

    let bots_table = Table::create()
        .table(bot_links::Entity)
        .col(&mut id_column(bot_links::Column::Id))
        .col(ColumnDef::new(bot_links::Column::Name).string_len(100).not_null())
        .col(&mut text_column(bot_links::Column::Description))
        .col(&mut text_column(bot_links::Column::TelegramUsername))
        .col(&mut text_column(bot_links::Column::TelegramLink))
        .col(&mut text_column(bot_links::Column::Icon))
        .col(
            ColumnDef::new(bot_links::Column::DisplayOrder)
                .integer()
                .not_null()
                .default(0),
        )
        .col(&mut flag_column(bot_links::Column::IsActive, true))
        .to_owned();
    create_table(db, backend, bots_table).await?;

    let notifications_table = Table::create()
        .table(notifications::Entity)
        .col(&mut id_column(notifications::Column::Id))
        .col(&mut text_column(notifications::Column::Title))
        .col(&mut text_column(notifications::Column::Message))
        .col(&mut flag_column(notifications::Column::IsActive, true))
        .col(&mut timestamp_column(notifications::Column::CreatedAt))
        .to_owned();
    create_table(db, backend, notifications_table).await?;

    let admin_logs_table = Table::create()
        .table(admin_logs::Entity)
        .col(&mut id_column(admin_logs::Column::Id))
        .col(ColumnDef::new(admin_logs::Column::AdminId).big_integer().null())
        .col(
            ColumnDef::new(admin_logs::Column::Action)
                .string_len(32)
                .not_null(),
        )
        .col(&mut text_column(admin_logs::Column::Target))
        .col(&mut text_column(admin_logs::Column::Details))
        .col(&mut timestamp_column(admin_logs::Column::CreatedAt))
        .to_owned();
    create_table(db, backend, admin_logs_table).await?;
    create_index(
        db,
        backend,
        Index::create()
            .name("idx_admin_logs_created")
            .table(admin_logs::Entity)
            .col(admin_logs::Column::CreatedAt)
            .to_owned(),
    )
    .await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(db_error)?;
    Ok(())
}

async fn create_index(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: IndexCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(db_error)?;
    Ok(())
}
