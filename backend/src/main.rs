use backend::config::Config;
use backend::{app, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let state = AppState::from_config(&config)
        .await
        .expect("open pairing store");
    let app = app(state);
    info!(addr = %config.bind_addr, store = ?config.store, "starting server");
    axum::serve(
        tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .expect("bind"),
        app,
    )
    .await
    .expect("server error");
}
