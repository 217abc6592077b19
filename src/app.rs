/*
 * Responsibility
 * - Config読み込み → JwtAuth 生成 → Router 組み立て
 * - Middleware の適用 (Bearer JWT / HTTP layers)
 * - axum::serve() で起動
 */
use std::net::SocketAddr;

use anyhow::Result;
use axum::{Router, routing::get};
use bearer_jwt::{Config, ConfigError, JwtAuth, MapClaims, middleware::http};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;

fn init_tracing() {
    // RUST_LOG=info,bearer_jwt=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn listen_addr() -> Result<SocketAddr, ConfigError> {
    let port: u16 = match std::env::var("PORT") {
        Ok(port) => port.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
        Err(_) => 3000,
    };
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let addr = listen_addr()?;
    let config = Config::<MapClaims>::from_env()?;
    tracing::debug!(?config, "jwt configuration loaded");
    let jwt = config.build()?;

    let app = build_router(jwt);

    tracing::info!(%addr, "starting demo API");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(jwt: JwtAuth<MapClaims>) -> Router {
    let router = Router::new()
        .route("/health", get(api::v1::handlers::health::health))
        .nest("/api/v1", api::v1::routes(jwt));

    http::apply(router, http::HttpLimits::default())
}
