use std::net::SocketAddr;

use axum::middleware;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use ride_hailing_backend::{
    config::Config,
    db,
    entities::user::{self, UserRole},
    handlers::auth::hash_password,
    middleware::rate_limit::{create_global_governor, log_request},
    realtime::ChangeFeed,
    routes, AppError, AppResult, AppState,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ride_hailing_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server stopped");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::from_env();
    tracing::info!(
        rate_scaling = %config.fare_rate_scaling,
        cancellation_window_minutes = config.cancellation.window_minutes,
        cancellation_anchor = ?config.cancellation.anchor,
        "Starting server at {}",
        config.server_addr()
    );

    let db = db::connect(&config).await?;
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations complete");

    seed_admin(&db, &config).await?;

    let state = AppState {
        db,
        config: config.clone(),
        feed: ChangeFeed::new(),
    };

    let app = routes::create_router(state)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(create_global_governor());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid address: {}", e)))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))
}

/// Seed the admin account if it doesn't exist
async fn seed_admin(db: &DatabaseConnection, config: &Config) -> AppResult<()> {
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(config.admin_email.as_str()))
        .one(db)
        .await?;

    if existing.is_none() {
        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(config.admin_email.clone()),
            password_hash: Set(hash_password(&config.admin_password)?),
            name: Set("Admin".to_string()),
            phone: Set(None),
            role: Set(UserRole::Admin),
            ..Default::default()
        };

        admin.insert(db).await?;
        tracing::info!("Admin account created: {}", config.admin_email);
    }

    Ok(())
}
