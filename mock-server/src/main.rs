use mock_server::Credentials;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let app_key = std::env::var("APP_KEY").unwrap_or_else(|_| "100001".to_string());
    let app_secret = std::env::var("APP_SECRET").unwrap_or_else(|_| "mock-secret".to_string());

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, %app_key, "mock open platform listening");
    mock_server::run(listener, Credentials::new(app_key, app_secret)).await
}
