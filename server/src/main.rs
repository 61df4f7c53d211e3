use clap::Parser;
use tracing_subscriber::EnvFilter;

use rfqhub_server::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rfqhub_server=debug")),
        )
        .init();

    let config = Config::parse();
    let app = rfqhub_server::build_app(&config)
        .await
        .expect("Failed to start");

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    tracing::info!(%addr, "rfqhub listening");

    axum::serve(listener, app).await.expect("Server failed");
}
