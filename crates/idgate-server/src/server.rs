use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::get,
};
use serde_json::{Value, json};
use tower::{ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use idgate_auth::http::{GatewayState, default_route_table, router};
use idgate_auth::idp::{IdentityProvider, KeycloakClient};
use idgate_auth::storage::{
    MemoryProfileStore, MemoryReconciliationLog, ProfileStore, ReconciliationLog,
};
use idgate_auth::{AuthenticationGateway, AuthorizationPipeline, TokenVerifier, UserLifecycleCoordinator};
use idgate_auth_postgres::PostgresGatewayStorage;

use crate::config::{AppConfig, StorageBackend};
use crate::middleware as app_middleware;

pub struct IdgateServer {
    addr: SocketAddr,
    app: Router,
}

/// Wires the identity provider client, storage and core services from configuration.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<GatewayState> {
    let idp: Arc<dyn IdentityProvider> = Arc::new(KeycloakClient::new(cfg.auth.idp.clone())?);
    let verifier = Arc::new(TokenVerifier::from_config(&cfg.auth.token, &cfg.auth.idp)?);

    let profiles: Arc<dyn ProfileStore>;
    let reconciliation: Arc<dyn ReconciliationLog>;
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; profiles are lost on restart");
            profiles = Arc::new(MemoryProfileStore::new());
            reconciliation = Arc::new(MemoryReconciliationLog::new());
        }
        StorageBackend::Postgres => {
            let Some(pg) = cfg.storage.postgres.as_ref() else {
                anyhow::bail!("storage.postgres config is required for the postgres backend");
            };
            let storage =
                PostgresGatewayStorage::connect(&pg.connection_url(), pg.pool_size).await?;
            if pg.run_migrations {
                storage.migrate().await?;
            }
            profiles = Arc::new(storage.profiles());
            reconciliation = Arc::new(storage.reconciliation());
        }
    }

    let coordinator = Arc::new(UserLifecycleCoordinator::new(
        idp.clone(),
        profiles.clone(),
        reconciliation,
        cfg.auth.users.clone(),
    ));
    let gateway = Arc::new(AuthenticationGateway::new(idp.clone(), profiles));
    let pipeline = Arc::new(AuthorizationPipeline::new(
        default_route_table(),
        idp,
        verifier,
    ));

    tracing::info!(
        idp = %cfg.auth.idp.base_url,
        realm = %cfg.auth.idp.realm,
        storage = ?cfg.storage.backend,
        "Gateway services initialized"
    );

    Ok(GatewayState::new(coordinator, gateway, pipeline))
}

pub fn build_app(cfg: &AppConfig, state: GatewayState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .merge(router(state))
        // Middleware stack (outermost last): body limit -> timeout -> cors -> trace -> request id
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TimeoutLayer::new(cfg.request_timeout())),
        )
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_timeout(err: BoxError) -> (StatusCode, Json<Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "timeout", "message": "Request timed out" })),
        )
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal_error", "message": err.to_string() })),
        )
    }
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<IdgateServer> {
        let state = build_state(&self.config).await?;
        let app = build_app(&self.config, state);

        Ok(IdgateServer {
            addr: self.addr,
            app,
        })
    }
}

impl IdgateServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
