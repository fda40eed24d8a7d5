use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use diskwala_domain::model::{
    FileRecord, FileType, FileUpdate, Money, NewFile, DEFAULT_FILE_TITLE,
};
use diskwala_domain::services::generate_short_code;
use diskwala_domain::storage::{FileStore, StorageError, UserStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::authenticate;
use crate::state::AppState;

use super::{ApiError, MessageBody};

/// Attempts at drawing a free short code before giving up.
const SHORT_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub file_type: FileType,
    pub short_code: String,
    pub file_url: String,
    pub thumbnail_url: String,
    pub views: i64,
    pub unique_views: i64,
    pub downloads: i64,
    pub unique_downloads: i64,
    pub earnings: Money,
    pub download_earnings: Money,
    pub allow_download: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            title: file.title,
            description: file.description,
            file_type: file.file_type,
            short_code: file.short_code.into_inner(),
            file_url: file.file_url,
            thumbnail_url: file.thumbnail_url,
            views: file.counters.views,
            unique_views: file.counters.unique_views,
            downloads: file.counters.downloads,
            unique_downloads: file.counters.unique_downloads,
            earnings: file.earnings,
            download_earnings: file.download_earnings,
            allow_download: file.allow_download,
            is_active: file.is_active,
            created_at: file.created_at,
        }
    }
}

/// Public listing entry; earnings stay private to the owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicFileResponse {
    pub title: String,
    pub file_type: FileType,
    pub short_code: String,
    pub thumbnail_url: String,
    pub views: i64,
    pub downloads: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicUserFilesResponse {
    pub username: String,
    pub brand_name: String,
    pub files: Vec<PublicFileResponse>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub allow_download: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub allow_download: Option<bool>,
    pub is_active: Option<bool>,
}

impl From<FileUpdateRequest> for FileUpdate {
    fn from(request: FileUpdateRequest) -> Self {
        FileUpdate {
            title: request.title.map(|title| title.trim().to_string()),
            description: request.description,
            thumbnail_url: request.thumbnail_url.map(|url| url.trim().to_string()),
            allow_download: request.allow_download,
            is_active: request.is_active,
        }
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub async fn upload_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<UploadRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let payload = payload.into_inner();

    let (Some(file_url), Some(raw_type)) = (required(payload.file_url), required(payload.file_type))
    else {
        return Err(ApiError::validation("file_url and file_type are required"));
    };
    let file_type = FileType::from_str(&raw_type.to_ascii_lowercase())
        .map_err(|_| ApiError::validation("invalid file_type"))?;

    let new_file = NewFile {
        user_id: user.id,
        title: required(payload.title).unwrap_or_else(|| DEFAULT_FILE_TITLE.to_string()),
        description: payload.description.unwrap_or_default(),
        file_type,
        thumbnail_url: required(payload.thumbnail_url).unwrap_or_else(|| file_url.clone()),
        file_url,
        allow_download: payload.allow_download.unwrap_or(true),
    };

    for attempt in 1..=SHORT_CODE_ATTEMPTS {
        let short_code = generate_short_code()?;
        match state
            .storage()
            .insert_file(new_file.clone(), short_code)
            .await
        {
            Ok(created) => {
                info!(file_id = created.id, user_id = user.id, "file uploaded");
                return Ok(HttpResponse::Created().json(FileResponse::from(created)));
            }
            Err(StorageError::Conflict(_)) => {
                warn!(attempt, "short code collision, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ApiError::Internal("could not allocate a unique short code".into()))
}

pub async fn my_files_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let files = state.storage().list_files_for_user(user.id, false).await?;
    Ok(HttpResponse::Ok().json(
        files
            .into_iter()
            .map(FileResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn update_file_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<FileUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let updated = state
        .storage()
        .update_file(path.into_inner(), Some(user.id), payload.into_inner().into())
        .await?
        .ok_or(ApiError::NotFound("file not found"))?;
    Ok(HttpResponse::Ok().json(FileResponse::from(updated)))
}

pub async fn delete_file_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let file_id = path.into_inner();
    if !state.storage().delete_file(file_id, Some(user.id)).await? {
        return Err(ApiError::NotFound("file not found"));
    }
    info!(file_id, user_id = user.id, "file deleted by owner");
    Ok(HttpResponse::Ok().json(MessageBody::new("file deleted")))
}

pub async fn user_files_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let owner = state
        .storage()
        .find_user_by_username(&path.into_inner())
        .await?
        .filter(|user| user.is_active)
        .ok_or(ApiError::NotFound("user not found"))?;
    let files = state.storage().list_files_for_user(owner.id, true).await?;
    Ok(HttpResponse::Ok().json(PublicUserFilesResponse {
        username: owner.username,
        brand_name: owner.brand_name,
        files: files
            .into_iter()
            .map(|file| PublicFileResponse {
                title: file.title,
                file_type: file.file_type,
                short_code: file.short_code.into_inner(),
                thumbnail_url: file.thumbnail_url,
                views: file.counters.views,
                downloads: file.counters.downloads,
                created_at: file.created_at,
            })
            .collect(),
    }))
}
