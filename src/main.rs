use bookstore_api::adapter::driven::{Argon2PasswordHasher, JwtIdentityProvider};
use bookstore_api::adapter::driver::{create_router, AppState};
use bookstore_api::adapter::{AppConfig, DatabaseMigration};

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bookstore_api=info,tower_http=info")),
        )
        .init();

    // 設定を読み込む
    let config = AppConfig::from_env()?;
    tracing::info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.database,
        "configuration loaded"
    );

    // 接続プールを作成
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.connection_string())
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        "database pool created"
    );

    // マイグレーションを実行
    DatabaseMigration::new(pool.clone()).run().await?;

    // 認証基盤とアプリケーション状態を作成
    let identity_provider = Arc::new(JwtIdentityProvider::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl_hours,
    ));
    let app_state = AppState::with_mysql_pool(
        pool,
        identity_provider,
        Arc::new(Argon2PasswordHasher),
        config.order_transaction_timeout,
    );

    // REST APIルーターを作成
    let app = create_router().with_state(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // サーバーを起動
    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "REST API server started");

    axum::serve(listener, app).await?;

    Ok(())
}
