// TrailCast API v0.1
use axum::routing::{get, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::inbound::AppState;
use services::danger::DangerThresholds;
use services::dispatcher::{DispatchConfig, Dispatcher};
use services::gateway::SmsGateway;
use services::providers::ProviderRouter;
use services::scheduler::{self, SchedulerState, SharedSchedulerState};
use services::sms::SegmentBudget;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// TrailCast API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TrailCast API",
        version = "0.1.0",
        description = "Satellite-SMS weather advisory service for hikers. \
            Resolves route waypoints to weather zones, fetches forecasts from \
            per-country providers with a global fallback, corrects them for \
            elevation, derives terrain danger ratings, and renders everything \
            into segment-budgeted SMS. Inbound messages arrive via the gateway \
            webhook and are parsed into the CAST/DELAY/DONE/UNITS/HELP/check-in \
            command vocabulary.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "SMS", description = "Inbound SMS webhook"),
        (name = "Scheduler", description = "Push scheduler and severe-weather poll status"),
    ),
    paths(
        routes::health::health_check,
        routes::inbound::inbound_sms,
        routes::scheduler::get_scheduler_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::inbound::InboundSms,
            routes::inbound::InboundReply,
            services::scheduler::SchedulerState,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailcast_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let http_timeout = Duration::from_secs(config.http_timeout_secs);

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Provider router with shared forecast cache
    let provider_router = ProviderRouter::new(
        &config.provider_user_agent,
        http_timeout,
        Duration::from_secs(config.cache_ttl_secs),
    );

    // Outbound SMS gateway client
    let gateway = SmsGateway::new(&config.gateway_url, config.gateway_token.clone(), http_timeout);

    let dispatcher = Arc::new(Dispatcher::new(
        pool.clone(),
        provider_router,
        gateway,
        DispatchConfig {
            grid_size_deg: config.grid_size_deg,
            budget: SegmentBudget {
                max_chars: config.segment_chars,
                max_segments: config.max_segments,
            },
            thresholds: DangerThresholds {
                wind_kmh: config.wind_threshold_kmh,
                precip_mm: config.precip_threshold_mm,
            },
            alert_level: config.alert_level,
            dedupe_ttl: Duration::from_secs(config.cache_ttl_secs),
        },
    ));

    // Scheduled tasks: twice-daily push + severe-weather poll, both tied to
    // one cancellation token for clean shutdown.
    let scheduler_state: SharedSchedulerState = Arc::new(RwLock::new(SchedulerState::new()));
    let cancel = CancellationToken::new();

    let push_task = tokio::spawn(scheduler::run_push_schedule(
        dispatcher.clone(),
        config.push_times.clone(),
        scheduler_state.clone(),
        cancel.clone(),
    ));
    let poll_task = tokio::spawn(scheduler::run_severe_poll_schedule(
        dispatcher.clone(),
        Duration::from_secs(config.severe_poll_secs),
        scheduler_state.clone(),
        cancel.clone(),
    ));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_cancel.cancel();
        }
    });

    // CORS — webhook + read-only status endpoints
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    // The webhook uses AppState; health and scheduler status use their own state.
    let sms_routes = Router::new()
        .route("/api/v1/sms/inbound", post(routes::inbound::inbound_sms))
        .with_state(AppState {
            dispatcher: dispatcher.clone(),
        });

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(pool);

    let scheduler_routes = Router::new()
        .route(
            "/api/v1/scheduler/status",
            get(routes::scheduler::get_scheduler_status),
        )
        .with_state(scheduler_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(sms_routes)
        .merge(scheduler_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("TrailCast API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .expect("Server terminated unexpectedly");

    // Scheduled tasks observe the same token; wait for them to wind down.
    let _ = tokio::join!(push_task, poll_task);
}
