mod app;
mod auth;
mod config;
mod error;
mod images;
mod ingredients;
mod pagination;
mod recipes;
mod shopping;
mod state;
mod storage;
mod tags;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foodgram=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    tracing::info!(
        missing_ingredient = ?app_state.config.shopping_list.missing_ingredient,
        default_format = ?app_state.config.shopping_list.default_format,
        "shopping list settings"
    );

    let app = app::build_app(app_state);
    app::serve(app).await
}
