mod app;
mod assets;
mod auth;
mod blobs;
mod config;
mod error;
mod records;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "clinic_inventory=debug,axum=info,tower_http=info".to_string());
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

    let state = AppState::init()?;
    if let (Ok(email), Ok(password)) =
        (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD"))
    {
        let name = std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Clinic Admin".into());
        auth::service::bootstrap_admin(&state, &email, &password, &name).await?;
    }

    let app = app::build_app(state);
    app::serve(app).await
}
