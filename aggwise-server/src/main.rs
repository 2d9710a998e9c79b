mod error;
mod router;
mod routes;

use aggwise::backends::{DocumentRepository, InMemoryStore, SearchClient};
use aggwise::config::{default_config_path, Config, ObservabilityConfig, StoreBackend};
use aggwise::{OrderAnalytics, OrderDocument, QueryService};
use aggwise_es::EsClient;
use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "aggwise-server")]
#[command(about = "Order search and aggregation server")]
#[command(version)]
struct Args {
    /// Configuration file path [default: ~/.aggwise/config.toml]
    #[arg(short, long, env = "AGGWISE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to, overrides `server.bind_addr`
    #[arg(short, long)]
    bind: Option<String>,
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.log_format.clone());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

type Backends = (
    Arc<dyn SearchClient>,
    Arc<dyn DocumentRepository<OrderDocument>>,
);

fn backends(config: &Config) -> Result<Backends> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; orders are lost on restart");
            let store = Arc::new(InMemoryStore::new());
            let client: Arc<dyn SearchClient> = store.clone();
            let repository: Arc<dyn DocumentRepository<OrderDocument>> = store;
            Ok((client, repository))
        }
        StoreBackend::Elasticsearch => {
            tracing::info!(
                url = %config.store.url,
                index = %config.store.index,
                "Using Elasticsearch store"
            );
            let es = Arc::new(EsClient::from_config(&config.store)?);
            let client: Arc<dyn SearchClient> = es.clone();
            let repository: Arc<dyn DocumentRepository<OrderDocument>> = es;
            Ok((client, repository))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_create(&config_path)?;

    init_tracing(&config.observability);
    tracing::info!("Config file: {}", config_path.display());

    let metrics = if config.observability.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let (client, repository) = backends(&config)?;
    let analytics = OrderAnalytics::new(
        QueryService::new(client),
        repository,
        config.analytics.clone(),
    );

    let app = router::router(router::AppState {
        analytics: Arc::new(analytics),
        metrics,
    });

    let addr = args.bind.unwrap_or_else(|| config.server.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
