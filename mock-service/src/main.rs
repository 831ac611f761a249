use mock_service::MockService;
use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=debug,tower_http=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("MOCK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let mock = MockService::new();
    if let Ok(teams) = std::env::var("MOCK_REJECT_TEAMS") {
        for team in teams.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            mock.reject_team(team);
        }
    }

    tracing::info!("Serving mock PR reviewer service on {addr}");
    mock.serve(addr).await
}
