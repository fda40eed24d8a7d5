use actix_web::{http::header::USER_AGENT, web, HttpRequest, HttpResponse};
use chrono::Utc;
use diskwala_domain::accrual::AccessEvent;
use diskwala_domain::model::{AccessKind, ShortCode};
use diskwala_domain::storage::{AccessOutcome, AccrualStore};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::auth::client_ip;
use crate::state::AppState;

use super::files::FileResponse;
use super::ApiError;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AccessQuery {
    pub download: Option<String>,
}

impl AccessQuery {
    fn download_requested(&self) -> bool {
        self.download
            .as_deref()
            .is_some_and(|flag| flag.trim().eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    pub should_download: bool,
}

/// `GET /f/{short_code}`: counts the access and returns the file.
pub async fn public_file_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<AccessQuery>,
) -> Result<HttpResponse, ApiError> {
    let not_found = || {
        counter!("api_access_events_total", "kind" => "lookup", "result" => "not_found")
            .increment(1);
        ApiError::NotFound("file not found or inactive")
    };
    let short_code = ShortCode::parse(&path.into_inner()).map_err(|_| not_found())?;
    let settings = state.site_settings().await?;

    let event = AccessEvent {
        short_code,
        client_ip: client_ip(&req, state.trusted_proxies()),
        user_agent: req
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        download_requested: query.download_requested(),
        occurred_at: Utc::now(),
    };

    let outcome = state
        .storage()
        .record_access(event, &settings)
        .await?
        .ok_or_else(not_found)?;
    record_metrics(&outcome);

    Ok(HttpResponse::Ok().json(AccessResponse {
        should_download: outcome.should_download,
        file: outcome.file.into(),
    }))
}

fn record_metrics(outcome: &AccessOutcome) {
    let delta = &outcome.delta;
    let kinds = [
        (AccessKind::View, delta.views, delta.unique_views),
        (AccessKind::Download, delta.downloads, delta.unique_downloads),
    ];
    for (kind, raw, unique) in kinds {
        if raw == 0 {
            continue;
        }
        let result = if unique > 0 { "unique" } else { "repeat" };
        counter!("api_access_events_total", "kind" => kind.as_ref().to_owned(), "result" => result)
            .increment(1);
    }
}
