use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use diskwala_domain::model::{Balances, NewUser, OtpPurpose, ProfileUpdate, UserRecord};
use diskwala_domain::services::{
    generate_otp, generate_token, hash_password, otp_digest, token_digest, verify_password,
};
use diskwala_domain::storage::{AuthTokenStore, OtpStore, UserStore};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::authenticate;
use crate::state::AppState;

use super::{ApiError, MessageBody};

const MAX_BRAND_NAME_CHARS: usize = 100;
const MAX_PHONE_CHARS: usize = 15;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub username: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub is_superuser: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub brand_name: String,
    pub phone: String,
    pub telegram_channel: Option<String>,
    pub support_link: Option<String>,
    pub allow_download: bool,
    pub email_verified: bool,
    pub is_superuser: bool,
    #[serde(flatten)]
    pub balances: Balances,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for ProfileResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            brand_name: user.brand_name,
            phone: user.phone,
            telegram_channel: user.telegram_channel,
            support_link: user.support_link,
            allow_download: user.allow_download,
            email_verified: user.email_verified,
            is_superuser: user.is_superuser,
            balances: user.balances,
            created_at: user.created_at,
        }
    }
}

/// Blank `telegram_channel` / `support_link` clear the stored value.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    pub brand_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_channel: Option<String>,
    pub support_link: Option<String>,
    pub allow_download: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub code: Option<String>,
    pub new_password: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

pub async fn register_handler(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(username), Some(email), Some(password)) = (
        required(payload.username),
        required(payload.email),
        payload.password.filter(|password| !password.is_empty()),
    ) else {
        return Err(ApiError::validation("username, email and password are required"));
    };
    if !looks_like_email(&email) {
        return Err(ApiError::validation("enter a valid email address"));
    }

    let storage = state.storage();
    if storage.find_user_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("username already taken".into()));
    }
    if storage.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let created = storage
        .insert_user(NewUser {
            username,
            email,
            password_hash: hash_password(&password)?,
            is_superuser: false,
            email_verified: false,
        })
        .await?;
    info!(user_id = created.id, "user registered");
    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "registered successfully".into(),
        username: created.username,
    }))
}

/// `POST /auth/token`
pub async fn login_handler(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = check_credentials(&state, payload.into_inner()).await?;
    issue_token(&state, user).await
}

/// `POST /admin/login`: same credential check, superusers only.
pub async fn admin_login_handler(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = check_credentials(&state, payload.into_inner()).await?;
    if !user.is_superuser {
        counter!("api_login_attempts_total", "result" => "forbidden").increment(1);
        return Err(ApiError::Forbidden("only superusers can log in as admin"));
    }
    issue_token(&state, user).await
}

async fn check_credentials(
    state: &AppState,
    payload: LoginRequest,
) -> Result<UserRecord, ApiError> {
    let (Some(username), Some(password)) = (required(payload.username), payload.password) else {
        return Err(ApiError::validation("username and password are required"));
    };

    let tracker = state.abuse_tracker();
    if tracker.is_blocked(&username) {
        counter!("api_login_attempts_total", "result" => "throttled").increment(1);
        return Err(ApiError::TooManyAttempts);
    }

    let candidate = state.storage().find_user_by_username(&username).await?;
    let verified = match &candidate {
        Some(user) if user.is_active => verify_password(&password, &user.password_hash)?,
        _ => false,
    };
    match candidate {
        Some(user) if verified => {
            tracker.reset(&username);
            counter!("api_login_attempts_total", "result" => "success").increment(1);
            Ok(user)
        }
        _ => {
            tracker.record(&username);
            counter!("api_login_attempts_total", "result" => "failure").increment(1);
            warn!(username = %username, "failed login attempt");
            Err(ApiError::Unauthorized(
                "unable to log in with provided credentials",
            ))
        }
    }
}

async fn issue_token(state: &AppState, user: UserRecord) -> Result<HttpResponse, ApiError> {
    let token = generate_token()?;
    state
        .storage()
        .insert_auth_token(&token_digest(&token), user.id, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        username: user.username,
        is_superuser: user.is_superuser,
    }))
}

pub async fn profile_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(user)))
}

pub async fn update_profile_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<ProfileUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let payload = payload.into_inner();
    if payload
        .brand_name
        .as_deref()
        .is_some_and(|name| name.trim().chars().count() > MAX_BRAND_NAME_CHARS)
    {
        return Err(ApiError::validation(format!(
            "brand_name must be at most {MAX_BRAND_NAME_CHARS} characters"
        )));
    }
    if payload
        .phone
        .as_deref()
        .is_some_and(|phone| phone.trim().chars().count() > MAX_PHONE_CHARS)
    {
        return Err(ApiError::validation(format!(
            "phone must be at most {MAX_PHONE_CHARS} characters"
        )));
    }

    let updated = state
        .storage()
        .update_profile(
            user.id,
            ProfileUpdate {
                brand_name: payload.brand_name,
                phone: payload.phone,
                telegram_channel: payload.telegram_channel.map(Some),
                support_link: payload.support_link.map(Some),
                allow_download: payload.allow_download,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(updated)))
}

pub async fn change_password_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let payload = payload.into_inner();
    let (Some(old_password), Some(new_password)) = (
        payload.old_password,
        payload.new_password.filter(|password| !password.is_empty()),
    ) else {
        return Err(ApiError::validation("old_password and new_password are required"));
    };
    if !verify_password(&old_password, &user.password_hash)? {
        return Err(ApiError::validation("old password is incorrect"));
    }

    state
        .storage()
        .set_password_hash(user.id, &hash_password(&new_password)?)
        .await?;
    info!(user_id = user.id, "password changed");
    Ok(HttpResponse::Ok().json(MessageBody::new("password changed")))
}

pub async fn change_email_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<ChangeEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let email = required(payload.into_inner().email)
        .filter(|email| looks_like_email(email))
        .ok_or_else(|| ApiError::validation("enter a valid email address"))?;

    if let Some(owner) = state.storage().find_user_by_email(&email).await? {
        if owner.id != user.id {
            return Err(ApiError::Conflict("email already registered".into()));
        }
    }
    state.storage().set_email(user.id, &email).await?;
    info!(user_id = user.id, "email changed, verification reset");
    Ok(HttpResponse::Ok().json(MessageBody::new("email updated, please verify it again")))
}

pub async fn send_email_otp_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    if user.email_verified {
        return Err(ApiError::validation("email already verified"));
    }

    issue_otp(&state, &user, OtpPurpose::EmailVerification).await?;
    Ok(HttpResponse::Ok().json(MessageBody::new("verification code sent")))
}

/// Any attempt consumes the outstanding code.
pub async fn verify_email_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let code = required(payload.into_inner().code)
        .ok_or_else(|| ApiError::validation("code is required"))?;

    consume_otp(&state, &user, OtpPurpose::EmailVerification, &code).await?;
    state.storage().mark_email_verified(user.id).await?;
    info!(user_id = user.id, "email verified");
    Ok(HttpResponse::Ok().json(MessageBody::new("email verified")))
}

/// Answers identically whether or not the address is registered.
pub async fn forgot_password_handler(
    state: web::Data<AppState>,
    payload: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = required(payload.into_inner().email)
        .ok_or_else(|| ApiError::validation("email is required"))?;

    match state.storage().find_user_by_email(&email).await? {
        Some(user) if user.is_active => {
            issue_otp(&state, &user, OtpPurpose::PasswordReset).await?;
            counter!("api_password_resets_total", "stage" => "requested").increment(1);
        }
        _ => {
            counter!("api_password_resets_total", "stage" => "unknown_email").increment(1);
        }
    }
    Ok(HttpResponse::Ok().json(MessageBody::new(
        "if the address is registered, a reset code has been sent",
    )))
}

/// Sets a new password from an emailed reset code and signs out every
/// existing session.
pub async fn reset_password_handler(
    state: web::Data<AppState>,
    payload: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(email), Some(code), Some(new_password)) = (
        required(payload.email),
        required(payload.code),
        payload.new_password.filter(|password| !password.is_empty()),
    ) else {
        return Err(ApiError::validation("email, code and new_password are required"));
    };

    let user = state
        .storage()
        .find_user_by_email(&email)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::validation("invalid or expired reset code"))?;
    consume_otp(&state, &user, OtpPurpose::PasswordReset, &code).await?;

    state
        .storage()
        .set_password_hash(user.id, &hash_password(&new_password)?)
        .await?;
    let revoked = state.storage().revoke_user_tokens(user.id).await?;
    state.abuse_tracker().reset(&user.username);
    counter!("api_password_resets_total", "stage" => "completed").increment(1);
    info!(user_id = user.id, revoked, "password reset");
    Ok(HttpResponse::Ok().json(MessageBody::new("password has been reset")))
}

async fn issue_otp(
    state: &AppState,
    user: &UserRecord,
    purpose: OtpPurpose,
) -> Result<(), ApiError> {
    let code = generate_otp()?;
    let ttl = chrono::Duration::from_std(state.otp_ttl())
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    state
        .storage()
        .upsert_otp(user.id, purpose, &otp_digest(user.id, &code), Utc::now() + ttl)
        .await?;
    state.mailer().send_otp(&user.email, &code, purpose).await?;
    Ok(())
}

/// Any attempt consumes the outstanding code.
async fn consume_otp(
    state: &AppState,
    user: &UserRecord,
    purpose: OtpPurpose,
    code: &str,
) -> Result<(), ApiError> {
    let (stored_digest, expires_at) = state
        .storage()
        .take_otp(user.id, purpose)
        .await?
        .ok_or_else(|| match purpose {
            OtpPurpose::EmailVerification => ApiError::validation("no verification code requested"),
            OtpPurpose::PasswordReset => ApiError::validation("invalid or expired reset code"),
        })?;
    if expires_at < Utc::now() {
        return Err(ApiError::validation(match purpose {
            OtpPurpose::EmailVerification => "verification code expired",
            OtpPurpose::PasswordReset => "invalid or expired reset code",
        }));
    }
    if stored_digest != otp_digest(user.id, code) {
        return Err(ApiError::validation(match purpose {
            OtpPurpose::EmailVerification => "invalid verification code",
            OtpPurpose::PasswordReset => "invalid or expired reset code",
        }));
    }
    Ok(())
}
