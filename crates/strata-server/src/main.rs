use anyhow::{Context, Result};
use strata_server::{app, demo, service, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::load_default().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {:#}, using defaults", e);
        Config::default()
    });

    let router = demo::router().context("Invalid demo route tree")?;
    info!("Registered {} routes", router.count());
    for template in router.templates() {
        info!("  {}", template);
    }

    let app = app(service(router, &config));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        "Server running at http://{} (default format: {})",
        addr, config.loading.default_format
    );
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
