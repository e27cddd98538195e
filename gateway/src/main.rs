use std::sync::Arc;

use lore_anchor_gateway::auth::Auth;
use lore_anchor_gateway::config::AppConfig;
use lore_anchor_gateway::quota::StaticPlanProvider;
use lore_anchor_gateway::routes::create_app;
use lore_anchor_gateway::state::AppState;

use lore_anchor_shared::catalog::{ArangoCatalog, InMemoryCatalog, SharedCatalog};
use lore_anchor_shared::objectstore::{ObjectStoreBackend, ObjectStoreService};
use lore_anchor_shared::queue::{InMemoryQueue, WorkQueue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    log::info!("[gateway] starting on {}:{}", config.host, config.port);
    log::info!("[gateway] object store backend: {}", config.object_store_backend);

    let auth = Auth::new(config.jwt_secret.as_bytes());

    let catalog: SharedCatalog = match config.database_connection_string.as_str() {
        "memory" => Arc::new(InMemoryCatalog::new()),
        url => Arc::new(
            ArangoCatalog::connect(
                url,
                &config.database_user,
                &config.database_password,
                &config.database_name,
            )
            .await?,
        ) as SharedCatalog,
    };

    let object_store_backend = match config.object_store_backend.as_str() {
        "local" => ObjectStoreBackend::Local {
            path: config.object_store_path.clone(),
        },
        "s3" => ObjectStoreBackend::S3 {
            bucket: config.object_store_bucket.clone(),
            region: config.object_store_region.clone(),
            key: config.object_store_key.clone(),
            secret: config.object_store_secret.clone(),
            endpoint: Some(config.object_store_endpoint.clone()).filter(|e| !e.is_empty()),
        },
        _ => ObjectStoreBackend::Memory,
    };
    let object_store = ObjectStoreService::new(object_store_backend)?;

    // Queue contract is broker-independent (spec §9); an in-process FIFO
    // satisfies it for this workspace, same as the worker side.
    let queue: Arc<dyn WorkQueue> = Arc::new(InMemoryQueue::new());

    let plan_provider = StaticPlanProvider::all_free();

    let state = Arc::new(AppState::new(
        config.clone(),
        auth,
        catalog,
        queue,
        object_store,
        plan_provider,
    ));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    log::info!("[gateway] listening on {}", listener.local_addr()?);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}
