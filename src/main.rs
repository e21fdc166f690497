use supportdesk::{app, config::AppConfig, db, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "supportdesk=debug,axum=info,tower_http=info".to_string());
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

    // A missing JWT_SECRET ends the process here.
    let config = AppConfig::from_env()?;

    let db = db::connect(&config.database_url).await?;
    db::migrate(&db).await?;

    let app_state = AppState::init(config, db)?;
    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config).await
}
