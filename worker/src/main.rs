pub mod config;
pub mod health;
pub mod pipeline;
pub mod runner;

use std::sync::Arc;

use lore_anchor_shared::catalog::{ArangoCatalog, InMemoryCatalog, SharedCatalog};
use lore_anchor_shared::objectstore::{ObjectStoreBackend, ObjectStoreService};
use lore_anchor_shared::queue::InMemoryQueue;

use crate::config::WorkerConfig;
use crate::health::WorkerMetrics;
use crate::pipeline::model::PerturbationModel;
use crate::pipeline::sign::ProvenanceSigner;
use crate::runner::{Runner, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Startup warm-up step (a): validate required configuration and exit
    // non-zero on any missing value (spec §4.4).
    let config = WorkerConfig::from_env()?;
    log::info!("[worker:{}] starting", config.worker_id);
    log::info!("[worker:{}] object store backend: {}", config.worker_id, config.object_store_backend);

    // Startup warm-up step (b): log compute-device availability. This
    // workspace has no GPU binding, so the "device" is always the CPU the
    // process runs on — logged anyway so an operator reading worker logs
    // sees the same warm-up line regardless of deployment target.
    log::info!("[worker:{}] compute device: cpu (no accelerator binding in this build)", config.worker_id);

    // Startup warm-up step (c): attempt to warm-load the perturbation model.
    let model = PerturbationModel::warmup(config.perturbation_model_path.as_deref());
    if model.is_degraded() {
        log::warn!(
            "[worker:{}] perturbation model warm-load failed; running in frequency-domain fallback mode",
            config.worker_id
        );
    }

    let signer = Arc::new(ProvenanceSigner::from_config(&config.signing_key, config.dev_mode)?);

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

    // The Queue contract is broker-independent (spec §9); this in-process
    // FIFO satisfies it without pulling in a broker client dependency this
    // workspace has no real endpoint to point at.
    let queue = Arc::new(InMemoryQueue::new());

    let metrics = WorkerMetrics::new(config.worker_id.clone());
    let health_port = config.health_port;
    let health_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_metrics, health_port).await {
            log::error!("[worker] health server exited: {e}");
        }
    });

    let runner = Runner {
        worker_id: config.worker_id.clone(),
        catalog,
        queue,
        object_store,
        model,
        signer,
        config,
        metrics,
    };

    let shutdown = ShutdownSignal::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("[worker] shutdown signal received, draining in-flight task");
            shutdown_for_signal.trigger();
        }
    });

    runner.run(shutdown).await;
    log::info!("[worker:{}] exited cleanly", runner.worker_id);
    Ok(())
}
