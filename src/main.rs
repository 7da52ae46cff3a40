use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use deploy_dashboard::AppState;
use deploy_dashboard::aggregator::Aggregator;
use deploy_dashboard::config::DashboardConfig;
use deploy_dashboard::handlers;
use deploy_dashboard::resolver::TargetResolver;
use deploy_dashboard::sources::github::GitHubClient;
use deploy_dashboard::sources::leancloud::LeanEngineClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("deploy_dashboard=debug,tower_http=debug")
        }))
        .init();

    let config_path =
        std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "./dashboard.toml".to_string());
    let mut config = DashboardConfig::load(&config_path)?;
    config.apply_env(|key| std::env::var(key).ok());

    // Misconfiguration is fatal here so requests never see it.
    let targets = config.parse_targets()?;
    let endpoints = config.region_endpoints(&targets)?;
    let repository = config.repository()?;
    tracing::info!(
        "tracking {} targets across {} regions, commits from {repository}",
        targets.len(),
        endpoints.len()
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("deploy-dashboard/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout())
        .build()?;

    let deployments = LeanEngineClient::new(http.clone(), endpoints, config.cache.deployments_policy());
    let commits = GitHubClient::new(
        http,
        config.github.api_url.clone(),
        repository,
        config.github.token.clone(),
        config.cache.commits_policy(),
    );
    let resolver = TargetResolver::new(Arc::new(deployments), Arc::new(commits));
    let aggregator = Aggregator::new(resolver).with_deadline(config.resolve_timeout());

    let state = AppState {
        aggregator: Arc::new(aggregator),
        targets: Arc::new(targets),
    };

    let app = Router::new()
        .route("/api/deployments", get(handlers::deployments::list_deployments))
        .route("/healthz", get(handlers::health::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("deploy-dashboard listening on {}", config.listen);

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
