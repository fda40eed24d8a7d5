use actix_web::{web, HttpResponse};
use diskwala_domain::storage::ContentStore;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::admin::{BotLinkResponse, NotificationResponse};
use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdIdsResponse {
    pub banner_id: String,
    pub interstitial_id: String,
    pub meta_banner_id: String,
    pub meta_interstitial_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeoResponse {
    pub site_name: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn bots_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let links = state.storage().list_bot_links(true).await?;
    Ok(HttpResponse::Ok().json(
        links
            .into_iter()
            .map(BotLinkResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn ad_ids_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let ids = state.site_settings().await?.ad_ids();
    Ok(HttpResponse::Ok().json(AdIdsResponse {
        banner_id: ids.banner_id,
        interstitial_id: ids.interstitial_id,
        meta_banner_id: ids.meta_banner_id,
        meta_interstitial_id: ids.meta_interstitial_id,
    }))
}

/// SEO metadata; a blank title falls back to the site name.
pub async fn seo_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let settings = state.site_settings().await?;
    let title = if settings.seo_title.trim().is_empty() {
        settings.site_name.clone()
    } else {
        settings.seo_title.clone()
    };
    Ok(HttpResponse::Ok().json(SeoResponse {
        site_name: settings.site_name.clone(),
        title,
        description: settings.seo_description.clone(),
        keywords: settings.seo_keywords.clone(),
    }))
}

/// `null` body when nothing is active.
pub async fn active_notification_handler(
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let active = state.storage().active_notification().await?;
    Ok(HttpResponse::Ok().json(active.map(NotificationResponse::from)))
}

pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".into(),
    })
}

/// Prometheus text exposition of the process-wide recorder.
pub async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.telemetry().render_metrics())
}
