//! Superuser-only endpoints: moderation, payouts, platform figures, site
//! settings, the audit log and the public content managed from the admin
//! panel.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use diskwala_domain::model::{
    AdminAction, AdminLogRecord, Balances, BotLinkRecord, BotLinkUpdate, Money, NewAdminLog,
    NewBotLink, NewNotification, NotificationRecord, NotificationUpdate, UserId, UserRecord,
    WithdrawalRecord, DEFAULT_BOT_ICON,
};
use diskwala_domain::rates::EarningPolicy;
use diskwala_domain::settings::{SettingsUpdate, SiteSettings};
use diskwala_domain::storage::{
    AuditLogStore, ContentStore, FileStore, SettingsStore, UserStore, WithdrawalStore,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::require_superuser;
use crate::state::AppState;

use super::files::FileResponse;
use super::withdrawals::{ledger_result, WithdrawalResponse};
use super::{ApiError, MessageBody};

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminUserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    #[serde(flatten)]
    pub balances: Balances,
    pub file_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminFileResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    pub user_username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminWithdrawalResponse {
    #[serde(flatten)]
    pub withdrawal: WithdrawalResponse,
    pub user_id: i64,
    pub username: String,
}

/// Entries returned by `GET /admin/logs`.
pub const ADMIN_LOG_LIMIT: u64 = 200;
/// Actor shown for entries without an admin.
const SYSTEM_ACTOR: &str = "System";

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminLogResponse {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: String,
    pub target: String,
    pub details: String,
}

impl From<AdminLogRecord> for AdminLogResponse {
    fn from(record: AdminLogRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.created_at,
            user: record
                .admin_username
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
            action: record.action,
            target: record.target,
            details: record.details,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_users: u64,
    pub total_files: u64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub total_earnings: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalStatsResponse {
    pub platform_earnings: Money,
    pub total_paid: Money,
    pub pending_withdrawals: Money,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ManualPayoutRequest {
    pub user_id: Option<UserId>,
    pub amount: Option<Money>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManualPayoutResponse {
    pub user_id: UserId,
    #[serde(flatten)]
    pub balances: Balances,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub earning_per_view: Money,
    pub earning_per_1000_views: Money,
    pub earning_per_1000_downloads: Money,
    pub earning_policy: EarningPolicy,
    pub min_withdrawal: Money,
    pub site_name: String,
    pub admob_banner_id: String,
    pub admob_interstitial_id: String,
    pub meta_banner_placement_id: String,
    pub meta_interstitial_placement_id: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: String,
}

impl From<&SiteSettings> for SettingsResponse {
    fn from(settings: &SiteSettings) -> Self {
        Self {
            earning_per_view: settings.earning_per_view,
            earning_per_1000_views: settings.earning_per_1000_views,
            earning_per_1000_downloads: settings.earning_per_1000_downloads,
            earning_policy: settings.earning_policy,
            min_withdrawal: settings.min_withdrawal,
            site_name: settings.site_name.clone(),
            admob_banner_id: settings.admob_banner_id.clone(),
            admob_interstitial_id: settings.admob_interstitial_id.clone(),
            meta_banner_placement_id: settings.meta_banner_placement_id.clone(),
            meta_interstitial_placement_id: settings.meta_interstitial_placement_id.clone(),
            seo_title: settings.seo_title.clone(),
            seo_description: settings.seo_description.clone(),
            seo_keywords: settings.seo_keywords.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SettingsPatchRequest {
    pub earning_per_view: Option<Money>,
    pub earning_per_1000_views: Option<Money>,
    pub earning_per_1000_downloads: Option<Money>,
    pub earning_policy: Option<EarningPolicy>,
    pub min_withdrawal: Option<Money>,
    pub site_name: Option<String>,
    pub admob_banner_id: Option<String>,
    pub admob_interstitial_id: Option<String>,
    pub meta_banner_placement_id: Option<String>,
    pub meta_interstitial_placement_id: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
}

impl From<SettingsPatchRequest> for SettingsUpdate {
    fn from(patch: SettingsPatchRequest) -> Self {
        SettingsUpdate {
            earning_per_view: patch.earning_per_view,
            earning_per_1000_views: patch.earning_per_1000_views,
            earning_per_1000_downloads: patch.earning_per_1000_downloads,
            earning_policy: patch.earning_policy,
            min_withdrawal: patch.min_withdrawal,
            site_name: patch.site_name,
            admob_banner_id: patch.admob_banner_id,
            admob_interstitial_id: patch.admob_interstitial_id,
            meta_banner_placement_id: patch.meta_banner_placement_id,
            meta_interstitial_placement_id: patch.meta_interstitial_placement_id,
            seo_title: patch.seo_title,
            seo_description: patch.seo_description,
            seo_keywords: patch.seo_keywords,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BotLinkResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub telegram_username: String,
    pub telegram_link: String,
    pub icon: String,
    pub order: i32,
    pub is_active: bool,
}

impl From<BotLinkRecord> for BotLinkResponse {
    fn from(link: BotLinkRecord) -> Self {
        Self {
            id: link.id,
            name: link.name,
            description: link.description,
            telegram_username: link.telegram_username,
            telegram_link: link.telegram_link,
            icon: link.icon,
            order: link.display_order,
            is_active: link.is_active,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BotLinkRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub telegram_username: Option<String>,
    pub telegram_link: Option<String>,
    pub icon: Option<String>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRecord> for NotificationResponse {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            message: record.message,
            is_active: record.is_active,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub is_active: Option<bool>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

pub async fn users_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let users = state.storage().list_users().await?;
    Ok(HttpResponse::Ok().json(
        users
            .into_iter()
            .map(|summary| AdminUserResponse {
                id: summary.user.id,
                username: summary.user.username,
                email: summary.user.email,
                email_verified: summary.user.email_verified,
                is_active: summary.user.is_active,
                is_superuser: summary.user.is_superuser,
                balances: summary.user.balances,
                file_count: summary.file_count,
                created_at: summary.user.created_at,
            })
            .collect::<Vec<_>>(),
    ))
}

pub async fn ban_user_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<UserId>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let user_id = path.into_inner();
    if user_id == admin.id {
        return Err(ApiError::validation("you cannot ban yourself"));
    }
    set_active(&state, user_id, false).await?;
    info!(user_id, admin_id = admin.id, "user banned");
    audit(
        &state,
        &admin,
        AdminAction::BanUser,
        format!("user:{user_id}"),
        String::new(),
    )
    .await;
    Ok(HttpResponse::Ok().json(MessageBody::new("user banned")))
}

pub async fn unban_user_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<UserId>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let user_id = path.into_inner();
    set_active(&state, user_id, true).await?;
    info!(user_id, admin_id = admin.id, "user unbanned");
    audit(
        &state,
        &admin,
        AdminAction::UnbanUser,
        format!("user:{user_id}"),
        String::new(),
    )
    .await;
    Ok(HttpResponse::Ok().json(MessageBody::new("user unbanned")))
}

/// `GET /admin/logs`: the most recent superuser actions, newest first.
pub async fn admin_logs_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let logs = state.storage().recent_admin_logs(ADMIN_LOG_LIMIT).await?;
    Ok(HttpResponse::Ok().json(
        logs.into_iter()
            .map(AdminLogResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// The action already happened; a failed append is logged, not surfaced.
async fn audit(
    state: &AppState,
    admin: &UserRecord,
    action: AdminAction,
    target: String,
    details: String,
) {
    let entry = NewAdminLog {
        admin_id: Some(admin.id),
        action,
        target,
        details,
        created_at: Utc::now(),
    };
    if let Err(err) = state.storage().append_admin_log(entry).await {
        warn!(error = %err, action = action.as_ref(), "admin log append failed");
    }
}

async fn audit_withdrawal(
    state: &AppState,
    admin: &UserRecord,
    action: AdminAction,
    withdrawal: &WithdrawalRecord,
) {
    audit(
        state,
        admin,
        action,
        format!("withdrawal:{}", withdrawal.id),
        format!(
            "user {} amount {}",
            withdrawal.user_id,
            withdrawal.amount.format_dp(2)
        ),
    )
    .await;
}

async fn set_active(state: &AppState, user_id: UserId, active: bool) -> Result<(), ApiError> {
    state
        .storage()
        .set_user_active(user_id, active)
        .await?
        .map(|_| ())
        .ok_or(ApiError::NotFound("user not found"))
}

pub async fn files_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let files = state.storage().list_all_files().await?;
    Ok(HttpResponse::Ok().json(
        files
            .into_iter()
            .map(|row| AdminFileResponse {
                file: row.file.into(),
                user_username: row.owner_username,
            })
            .collect::<Vec<_>>(),
    ))
}

pub async fn delete_file_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let file_id = path.into_inner();
    if !state.storage().delete_file(file_id, None).await? {
        return Err(ApiError::NotFound("file not found"));
    }
    info!(file_id, admin_id = admin.id, "file deleted by admin");
    audit(
        &state,
        &admin,
        AdminAction::DeleteFile,
        format!("file:{file_id}"),
        String::new(),
    )
    .await;
    Ok(HttpResponse::Ok().json(MessageBody::new("file deleted permanently")))
}

pub async fn stats_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let stats = state.storage().platform_stats().await?;
    Ok(HttpResponse::Ok().json(StatsResponse {
        total_users: stats.total_users,
        total_files: stats.total_files,
        total_views: stats.total_views,
        total_downloads: stats.total_downloads,
        total_earnings: stats.total_earnings,
    }))
}

pub async fn global_stats_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let stats = state.storage().platform_stats().await?;
    Ok(HttpResponse::Ok().json(GlobalStatsResponse {
        platform_earnings: stats.total_earnings,
        total_paid: stats.total_paid,
        pending_withdrawals: stats.pending_withdrawals,
    }))
}

pub async fn withdrawals_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let rows = state.storage().list_all_withdrawals().await?;
    Ok(HttpResponse::Ok().json(
        rows.into_iter()
            .map(|row| AdminWithdrawalResponse {
                user_id: row.withdrawal.user_id,
                withdrawal: row.withdrawal.into(),
                username: row.username,
            })
            .collect::<Vec<_>>(),
    ))
}

pub async fn approve_withdrawal_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let result = state
        .storage()
        .approve_withdrawal(path.into_inner(), Utc::now())
        .await;
    counter!("api_withdrawals_total", "action" => "approve", "result" => ledger_result(&result))
        .increment(1);
    let approved = result?;
    audit_withdrawal(&state, &admin, AdminAction::ApproveWithdrawal, &approved).await;
    Ok(HttpResponse::Ok().json(WithdrawalResponse::from(approved)))
}

pub async fn reject_withdrawal_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let result = state
        .storage()
        .reject_withdrawal(path.into_inner(), Utc::now())
        .await;
    counter!("api_withdrawals_total", "action" => "reject", "result" => ledger_result(&result))
        .increment(1);
    let rejected = result?;
    audit_withdrawal(&state, &admin, AdminAction::RejectWithdrawal, &rejected).await;
    Ok(HttpResponse::Ok().json(WithdrawalResponse::from(rejected)))
}

pub async fn manual_payout_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<ManualPayoutRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let (Some(user_id), Some(amount)) = (payload.user_id, payload.amount) else {
        return Err(ApiError::validation("user_id and amount are required"));
    };
    let result = state.storage().manual_payout(user_id, amount).await;
    counter!(
        "api_withdrawals_total",
        "action" => "manual_payout",
        "result" => ledger_result(&result)
    )
    .increment(1);
    let user = result?;
    info!(user_id, admin_id = admin.id, amount = %amount, "manual payout");
    audit(
        &state,
        &admin,
        AdminAction::ManualPayout,
        format!("user:{user_id}"),
        format!("amount {}", amount.format_dp(2)),
    )
    .await;
    Ok(HttpResponse::Ok().json(ManualPayoutResponse {
        user_id: user.id,
        balances: user.balances,
    }))
}

pub async fn settings_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let settings = state.storage().load_settings().await?;
    Ok(HttpResponse::Ok().json(SettingsResponse::from(&settings)))
}

pub async fn update_settings_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<SettingsPatchRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_superuser(&state, &req).await?;
    let patch = payload.into_inner();
    let details = serde_json::to_string(&patch).unwrap_or_default();
    let update = SettingsUpdate::from(patch);
    update
        .validate()
        .map_err(|err| ApiError::validation(err.to_string()))?;

    let saved = state.storage().update_settings(update).await?;
    state.settings_cache().invalidate();
    info!(admin_id = admin.id, "site settings updated");
    audit(
        &state,
        &admin,
        AdminAction::UpdateSettings,
        "site_settings".to_string(),
        details,
    )
    .await;
    Ok(HttpResponse::Ok().json(SettingsResponse::from(&saved)))
}

pub async fn bots_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let links = state.storage().list_bot_links(false).await?;
    Ok(HttpResponse::Ok().json(
        links
            .into_iter()
            .map(BotLinkResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn create_bot_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<BotLinkRequest>,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let payload = payload.into_inner();
    let link = NewBotLink {
        name: required(payload.name, "name")?,
        telegram_username: required(payload.telegram_username, "telegram_username")?,
        telegram_link: required(payload.telegram_link, "telegram_link")?,
        description: payload.description.unwrap_or_default(),
        icon: payload
            .icon
            .map(|icon| icon.trim().to_string())
            .filter(|icon| !icon.is_empty())
            .unwrap_or_else(|| DEFAULT_BOT_ICON.to_string()),
        display_order: payload.order.unwrap_or(0),
        is_active: payload.is_active.unwrap_or(true),
    };
    let created = state.storage().insert_bot_link(link).await?;
    Ok(HttpResponse::Created().json(BotLinkResponse::from(created)))
}

pub async fn update_bot_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<BotLinkRequest>,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let payload = payload.into_inner();
    let updated = state
        .storage()
        .update_bot_link(
            path.into_inner(),
            BotLinkUpdate {
                name: payload.name,
                description: payload.description,
                telegram_username: payload.telegram_username,
                telegram_link: payload.telegram_link,
                icon: payload.icon,
                display_order: payload.order,
                is_active: payload.is_active,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("bot not found"))?;
    Ok(HttpResponse::Ok().json(BotLinkResponse::from(updated)))
}

pub async fn delete_bot_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    if !state.storage().delete_bot_link(path.into_inner()).await? {
        return Err(ApiError::NotFound("bot not found"));
    }
    Ok(HttpResponse::Ok().json(MessageBody::new("bot deleted")))
}

pub async fn notifications_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let rows = state.storage().list_notifications().await?;
    Ok(HttpResponse::Ok().json(
        rows.into_iter()
            .map(NotificationResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn create_notification_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<NotificationRequest>,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let payload = payload.into_inner();
    let created = state
        .storage()
        .insert_notification(
            NewNotification {
                title: required(payload.title, "title")?,
                message: required(payload.message, "message")?,
                is_active: payload.is_active.unwrap_or(true),
            },
            Utc::now(),
        )
        .await?;
    Ok(HttpResponse::Created().json(NotificationResponse::from(created)))
}

pub async fn update_notification_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<NotificationRequest>,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    let payload = payload.into_inner();
    let updated = state
        .storage()
        .update_notification(
            path.into_inner(),
            NotificationUpdate {
                title: payload.title,
                message: payload.message,
                is_active: payload.is_active,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("notification not found"))?;
    Ok(HttpResponse::Ok().json(NotificationResponse::from(updated)))
}

pub async fn delete_notification_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require_superuser(&state, &req).await?;
    if !state.storage().delete_notification(path.into_inner()).await? {
        return Err(ApiError::NotFound("notification not found"));
    }
    Ok(HttpResponse::Ok().json(MessageBody::new("notification deleted")))
}
