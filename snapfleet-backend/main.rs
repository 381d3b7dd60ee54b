mod api;
mod auth;
mod config;
mod hosts;
mod provider;
mod snapshots;

use anyhow::Context;
use axum::body::Body;
use axum::extract::Request;
use clap::Parser;
use dotenvy::dotenv;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::api::changes::ResourceChangeEvent;
use crate::auth::gate::PermissionGate;
use crate::auth::AuthConfig;
use crate::config::{Config, ProviderBackend};
use crate::hosts::file_repository::FileHostRepository;
use crate::hosts::repository::HostRepository;
use crate::provider::mock::MockProvider;
use crate::provider::vsphere::{VsphereClient, VsphereProvider};
use crate::provider::ComputeProvider;
use crate::snapshots::registry::SnapshotRegistry;
use crate::snapshots::service::SnapshotService;

#[derive(Parser)]
#[command(name = "snapfleet", about = "Snapshot lifecycle service for fleet hosts")]
enum Cli {
    /// Start the HTTP server (default when no subcommand is given)
    #[command(alias = "run")]
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    // Parse CLI args — default to Serve when no subcommand is given,
    // but still allow --help and --version to work.
    let args: Vec<String> = std::env::args().collect();
    let cli = if args.len() <= 1 {
        Cli::Serve
    } else {
        Cli::parse()
    };

    match cli {
        Cli::Serve => run_server().await,
    }
}

async fn run_server() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("snapfleet=info,tower_http=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true).with_bracketed_fields(false))
        .with(sentry::integrations::tracing::layer().event_filter(
            |metadata| match *metadata.level() {
                tracing::Level::ERROR => sentry::integrations::tracing::EventFilter::Event,
                tracing::Level::WARN | tracing::Level::INFO => {
                    sentry::integrations::tracing::EventFilter::Breadcrumb
                }
                _ => sentry::integrations::tracing::EventFilter::Ignore,
            },
        ))
        .init();

    let _guard = sentry::init((
        config.sentry_dsn.clone().unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            send_default_pii: true,
            traces_sample_rate: 0.2,
            enable_logs: true,
            ..Default::default()
        },
    ));

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let data_dir = config.data_dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".snapfleet")
    });
    std::fs::create_dir_all(&data_dir).context("failed to create data directory")?;

    let host_repo: Arc<dyn HostRepository> = Arc::new(FileHostRepository::new(&data_dir));
    host_repo
        .load_all()
        .await
        .context("failed to load host inventory")?;

    let registry = Arc::new(SnapshotRegistry::load(data_dir.join("snapshots.yaml")));

    let gate = Arc::new(PermissionGate::new(AuthConfig::load(
        &data_dir.join("roles.yaml"),
    )));

    let provider: Arc<dyn ComputeProvider> = match config.provider {
        ProviderBackend::Vsphere => {
            let base_url = config
                .vsphere_api_url
                .clone()
                .context("VSPHERE_API_URL is required when SNAPFLEET_PROVIDER=vsphere")?;
            tracing::info!(gateway = %base_url, "using vSphere snapshot provider");
            Arc::new(VsphereProvider::new(VsphereClient::new(
                http_client.clone(),
                base_url,
                config.vsphere_api_token.clone(),
            )))
        }
        ProviderBackend::Mock => {
            tracing::info!("using in-memory mock snapshot provider");
            Arc::new(MockProvider::new())
        }
    };

    let service = Arc::new(SnapshotService::new(
        provider,
        registry.clone(),
        gate.clone(),
        host_repo.clone(),
        config.provider_timeout,
    ));

    let (changes_tx, _) = tokio::sync::broadcast::channel::<ResourceChangeEvent>(256);

    let app_state = api::AppState {
        host_repo,
        registry,
        service,
        gate,
        changes_tx,
    };

    let app = api::create_app(app_state)
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(NewSentryLayer::<Request<Body>>::new_from_top());

    let port = config.port;
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
