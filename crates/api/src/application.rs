use std::{path::Path, sync::Arc};

#[cfg(unix)]
use std::fs;

use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    middleware::Logger,
    web, App, HttpRequest, HttpServer, Scope,
};
use diskwala_domain::config::{AdminBootstrap, ApiConfig, ConfigError};
use diskwala_domain::model::NewUser;
use diskwala_domain::services::{
    hash_password, init_telemetry, CredentialError, LogMailer, SettingsCache, TelemetryConfig,
    TelemetryError,
};
use diskwala_domain::storage::{StorageError, UserStore};
use diskwala_storage::SeaOrmStorage;
use thiserror::Error;
use tracing::info;

use crate::{
    handlers::{
        access, account, admin, analytics, content, files, metrics_handler, withdrawals, ApiError,
    },
    state::AppState,
};

pub const API_PREFIX: &str = "/api/v1";

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;

    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let mut builder = SeaOrmStorage::builder().database_url(config.database_url());
    if let Some(max) = config.database_max_connections() {
        builder = builder.max_connections(max);
    }
    let storage = builder.build().await?;

    if let Some(admin) = config.bootstrap_admin() {
        bootstrap_superuser(&storage, admin).await?;
    }

    let state = AppState::new(
        storage,
        SettingsCache::new(config.settings_cache_ttl()),
        telemetry.clone(),
        Arc::new(LogMailer),
        config.email_otp_ttl(),
    )
    .with_trusted_proxies(config.trusted_proxies());

    // Admin routes and metrics move to the internal listener when one exists.
    let split_admin = config.has_internal_listener();

    let public_state = state.clone();
    let mut public_server = HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .wrap(Logger::default());

        if !split_admin {
            app = app.route("/metrics", web::get().to(metrics_handler));
        }

        app.service(api_scope(!split_admin))
    });

    #[cfg(unix)]
    {
        if let Some(socket) = config.api_unix_socket() {
            cleanup_socket(socket)?;
            public_server = public_server.bind_uds(socket)?;
        } else {
            public_server = public_server.bind(config.api_bind_address())?;
        }
    }

    #[cfg(not(unix))]
    {
        if let Some(socket) = config.api_unix_socket() {
            return Err(BootstrapError::Io(std::io::Error::other(format!(
                "unix socket '{socket}' requested but this platform does not support it"
            ))));
        }
        public_server = public_server.bind(config.api_bind_address())?;
    }

    let public_server = public_server.run();

    let internal_server = if split_admin {
        let internal_state = state.clone();
        let mut internal_server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(internal_state.clone()))
                .app_data(json_config())
                .app_data(path_config())
                .app_data(query_config())
                .wrap(Logger::default())
                .route("/metrics", web::get().to(metrics_handler))
                .service(admin_scope())
        });

        #[cfg(unix)]
        {
            if let Some(socket) = config.internal_unix_socket() {
                cleanup_socket(socket)?;
                internal_server = internal_server.bind_uds(socket)?;
            } else if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(socket) = config.internal_unix_socket() {
                return Err(BootstrapError::Io(std::io::Error::other(format!(
                    "internal unix socket '{socket}' requested but this platform does not support it"
                ))));
            }
            if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        Some(internal_server.run())
    } else {
        None
    };

    info!(
        bind = config.api_bind_address(),
        internal = split_admin,
        "api listening"
    );

    if let Some(internal) = internal_server {
        tokio::try_join!(public_server, internal)?;
    } else {
        public_server.await?;
    }

    Ok(())
}

/// `/api/v1` scope with the public and user routes; superuser routes are
/// mounted too when `include_admin` is set.
pub fn api_scope(include_admin: bool) -> Scope {
    let scope = web::scope(API_PREFIX).configure(public_routes);
    if include_admin {
        scope.configure(admin_routes)
    } else {
        scope
    }
}

pub fn admin_scope() -> Scope {
    web::scope(API_PREFIX).configure(admin_routes)
}

pub fn public_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(account::register_handler))
        .route("/auth/token", web::post().to(account::login_handler))
        .route("/admin/login", web::post().to(account::admin_login_handler))
        .route("/f/{short_code}", web::get().to(access::public_file_handler))
        .route("/u/{username}/files", web::get().to(files::user_files_handler))
        .route("/bots", web::get().to(content::bots_handler))
        .route("/ad-ids", web::get().to(content::ad_ids_handler))
        .route("/seo", web::get().to(content::seo_handler))
        .route(
            "/notifications/active",
            web::get().to(content::active_notification_handler),
        )
        .route("/health", web::get().to(content::health_handler))
        .service(
            web::resource("/profile")
                .route(web::get().to(account::profile_handler))
                .route(web::patch().to(account::update_profile_handler)),
        )
        .route(
            "/change-password",
            web::post().to(account::change_password_handler),
        )
        .route("/change-email", web::post().to(account::change_email_handler))
        .route("/email/otp", web::post().to(account::send_email_otp_handler))
        .route("/email/verify", web::post().to(account::verify_email_handler))
        .route(
            "/forgot-password",
            web::post().to(account::forgot_password_handler),
        )
        .route(
            "/reset-password",
            web::post().to(account::reset_password_handler),
        )
        .route("/upload", web::post().to(files::upload_handler))
        .route("/my-files", web::get().to(files::my_files_handler))
        .service(
            web::resource("/files/{id}")
                .route(web::patch().to(files::update_file_handler))
                .route(web::delete().to(files::delete_file_handler)),
        )
        .route("/analytics", web::get().to(analytics::analytics_handler))
        .route("/balance", web::get().to(withdrawals::balance_handler))
        .route("/withdraw", web::post().to(withdrawals::withdraw_handler))
        .route(
            "/withdrawals",
            web::get().to(withdrawals::list_withdrawals_handler),
        );
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/admin/users", web::get().to(admin::users_handler))
        .service(
            web::resource("/admin/users/{id}/ban")
                .route(web::post().to(admin::ban_user_handler))
                .route(web::delete().to(admin::unban_user_handler)),
        )
        .route("/admin/files", web::get().to(admin::files_handler))
        .route(
            "/admin/files/{id}",
            web::delete().to(admin::delete_file_handler),
        )
        .route("/admin/stats", web::get().to(admin::stats_handler))
        .route(
            "/admin/global-stats",
            web::get().to(admin::global_stats_handler),
        )
        .route("/admin/withdrawals", web::get().to(admin::withdrawals_handler))
        .route(
            "/admin/withdrawals/{id}/approve",
            web::post().to(admin::approve_withdrawal_handler),
        )
        .route(
            "/admin/withdrawals/{id}/reject",
            web::post().to(admin::reject_withdrawal_handler),
        )
        .route(
            "/admin/manual-payout",
            web::post().to(admin::manual_payout_handler),
        )
        .route("/admin/logs", web::get().to(admin::admin_logs_handler))
        .service(
            web::resource("/admin/settings")
                .route(web::get().to(admin::settings_handler))
                .route(web::patch().to(admin::update_settings_handler)),
        )
        .service(
            web::resource("/admin/bots")
                .route(web::get().to(admin::bots_handler))
                .route(web::post().to(admin::create_bot_handler)),
        )
        .service(
            web::resource("/admin/bots/{id}")
                .route(web::patch().to(admin::update_bot_handler))
                .route(web::delete().to(admin::delete_bot_handler)),
        )
        .service(
            web::resource("/admin/notifications")
                .route(web::get().to(admin::notifications_handler))
                .route(web::post().to(admin::create_notification_handler)),
        )
        .service(
            web::resource("/admin/notifications/{id}")
                .route(web::patch().to(admin::update_notification_handler))
                .route(web::delete().to(admin::delete_notification_handler)),
        );
}

/// Extractor failures answer with the same `{"error": ...}` body as handlers.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            ApiError::validation(format!("invalid request body: {err}")).into()
        })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: PathError, _req: &HttpRequest| {
        ApiError::validation(format!("invalid path: {err}")).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req: &HttpRequest| {
        ApiError::validation(format!("invalid query: {err}")).into()
    })
}

/// Creates the configured superuser unless the username is already taken.
async fn bootstrap_superuser(
    storage: &SeaOrmStorage,
    admin: &AdminBootstrap,
) -> Result<(), BootstrapError> {
    if storage
        .find_user_by_username(&admin.username)
        .await?
        .is_some()
    {
        return Ok(());
    }
    let user = storage
        .insert_user(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password)?,
            is_superuser: true,
            email_verified: true,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "bootstrap superuser created");
    Ok(())
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(unix)]
fn cleanup_socket(path: &str) -> std::io::Result<()> {
    let socket_path = Path::new(path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn cleanup_socket(_path: &str) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[actix_web::test]
    async fn cleanup_socket_removes_stale_file() {
        let path = std::env::temp_dir().join(format!(
            "diskwala-test-{}-{}.sock",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, b"stub").expect("write socket file");
        cleanup_socket(path.to_str().unwrap()).expect("cleanup succeeds");
        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn bootstrap_superuser_is_idempotent() {
        let storage = SeaOrmStorage::connect("sqlite::memory:")
            .await
            .expect("storage inits");
        let admin = AdminBootstrap {
            username: "root".into(),
            password: "hunter22".into(),
            email: "root@localhost".into(),
        };

        bootstrap_superuser(&storage, &admin).await.expect("first run");
        bootstrap_superuser(&storage, &admin).await.expect("second run");

        let user = storage
            .find_user_by_username("root")
            .await
            .unwrap()
            .expect("superuser exists");
        assert!(user.is_superuser);
        assert!(user.email_verified);
        assert_eq!(storage.list_users().await.unwrap().len(), 1);
    }
}
