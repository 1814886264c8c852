use anyhow::Context;
use depot_api::{app, jobs, metrics::{Metrics, MetricsReporter}, AppState, AuthConfig, Services};
use depot_logistics::Collaborators;
use depot_store::{
    CachedStoreDirectory, Config, DbClient, EventProducer, HttpLogisticsGateway, HttpStoreDirectory,
    KafkaNotificationSink, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "depot_api=debug,depot_logistics=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting depot API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis-cached store directory
    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    let timeout = Duration::from_secs(config.gateway.timeout_seconds);
    let http_directory = HttpStoreDirectory::new(&config.directory.base_url, timeout)
        .context("Failed to build directory client")?;
    let directory = CachedStoreDirectory::new(
        Arc::new(http_directory),
        redis,
        config.directory.cache_ttl_seconds,
    );

    // Kafka notifications
    let producer =
        EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;
    let notifier = KafkaNotificationSink::new(producer, config.kafka.notification_topic.clone());

    let gateway =
        HttpLogisticsGateway::new(&config.gateway.base_url, &config.gateway.api_key, timeout)
            .map_err(|e| anyhow::anyhow!("Failed to build gateway client: {}", e))?;

    let metrics = Metrics::new().map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;
    let metrics = Arc::new(metrics);

    let collaborators = Collaborators {
        cargo: Arc::new(db.cargo_repository()),
        shipments: Arc::new(db.shipment_repository()),
        deliveries: Arc::new(db.delivery_repository()),
        directory: Arc::new(directory),
        gateway: Arc::new(gateway),
        notifier: Arc::new(notifier),
        reporter: Arc::new(MetricsReporter::new(metrics.clone())),
    };
    let services = Services::new(collaborators);

    let _jobs = jobs::spawn_all(services.jobs.clone(), &config.jobs, metrics.clone());

    let app_state = AppState {
        services,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        metrics,
        batch_limit: config.jobs.batch_limit,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
