//! Outer consume loop of the Protection Worker (spec §4.4). Single-threaded
//! cooperative loop per process: take one envelope, dedup/idempotency-gate
//! it, transition the Catalog row, run the pipeline, write back a terminal
//! status. Horizontal scale-out (more worker processes), not in-process
//! concurrency, is the scaling axis (spec §5).

use std::sync::Arc;
use std::time::Duration;

use lore_anchor_shared::catalog::{Catalog, CatalogError, SharedCatalog};
use lore_anchor_shared::error::CoreError;
use lore_anchor_shared::models::{Envelope, Task};
use lore_anchor_shared::objectstore::ObjectStoreService;
use lore_anchor_shared::queue::{QueueItem, WorkQueue};
use rand::Rng;
use tokio::sync::Notify;

use crate::config::WorkerConfig;
use crate::health::WorkerMetrics;
use crate::pipeline::model::PerturbationModel;
use crate::pipeline::sign::ProvenanceSigner;
use crate::pipeline::watermark::mint_watermark_id;
use crate::pipeline::{self, PipelineInputs};

/// Cooperative shutdown flag, set once by a signal handler and polled by the
/// loop between queue takes (spec §5 "Cancellation & timeouts": stop taking
/// new envelopes, run the in-flight task to completion).
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    notify: Arc<Notify>,
    flag: Arc<std::sync::atomic::AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

pub struct Runner {
    pub worker_id: String,
    pub catalog: SharedCatalog,
    pub queue: Arc<dyn WorkQueue>,
    pub object_store: ObjectStoreService,
    pub model: PerturbationModel,
    pub signer: Arc<ProvenanceSigner>,
    pub config: WorkerConfig,
    pub metrics: Arc<WorkerMetrics>,
}

impl Runner {
    /// Run until `shutdown` is triggered, then drain the in-flight task (if
    /// any) and return. No new envelope is taken once the flag is observed.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        let poll_timeout = Duration::from_secs(self.config.poll_timeout_secs);
        log::info!("[worker:{}] consume loop started", self.worker_id);

        loop {
            if shutdown.is_set() {
                log::info!("[worker:{}] shutdown observed, exiting consume loop", self.worker_id);
                break;
            }

            let item = match self.queue.take(poll_timeout).await {
                Ok(Some(item)) => item,
                Ok(None) => continue, // poll timeout, nothing available — re-check shutdown
                Err(e) => {
                    log::error!("[worker:{}] queue take failed: {e}", self.worker_id);
                    continue;
                }
            };

            self.metrics.set_processing(true);
            self.handle_item(item).await;
            self.metrics.set_processing(false);
        }
    }

    async fn handle_item(&self, item: QueueItem) {
        let envelope = match item {
            QueueItem::Envelope(e) => e,
            QueueItem::Malformed(payload) => {
                log::warn!("[worker:{}] malformed envelope, dead-lettering", self.worker_id);
                let _ = self
                    .queue
                    .push_dead_letter(payload, "failed to deserialize envelope".to_string())
                    .await;
                return;
            }
        };

        if let Err(e) = self.process_envelope(&envelope).await {
            log::error!(
                "[worker:{}] envelope for image {} could not be processed: {e}",
                self.worker_id,
                envelope.image_id
            );
        }
    }

    async fn process_envelope(&self, envelope: &Envelope) -> anyhow::Result<()> {
        // Step 3: read the authoritative Image row.
        let image = match self.catalog.get_image(envelope.image_id).await? {
            Some(image) => image,
            None => {
                log::warn!(
                    "[worker:{}] image {} not found in catalog, dead-lettering envelope",
                    self.worker_id,
                    envelope.image_id
                );
                let payload = serde_json::to_string(envelope)?;
                self.queue
                    .push_dead_letter(payload, "referenced image_id not found".to_string())
                    .await?;
                return Ok(());
            }
        };

        // Step 4: idempotency / dedup gate.
        use lore_anchor_shared::models::ImageStatus;
        if matches!(image.status, ImageStatus::Processing | ImageStatus::Completed) {
            log::info!(
                "[worker:{}] image {} already {:?}, skipping (redelivery or duplicate)",
                self.worker_id,
                envelope.image_id,
                image.status
            );
            return Ok(());
        }

        // Step 5: guarded pending -> processing, minting the watermark id.
        let watermark_id = mint_watermark_id();
        match retry_catalog(|| self.catalog.set_processing(envelope.image_id, &watermark_id)).await
        {
            Ok(()) => {}
            Err(CatalogError::InvalidTransition { .. }) => {
                log::info!(
                    "[worker:{}] image {} lost the race to another worker/retry, skipping",
                    self.worker_id,
                    envelope.image_id
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        // Step 6: insert the Task row.
        let task = Task::started(envelope.image_id, self.worker_id.clone());
        let task_id = task.task_id;
        retry_catalog(|| self.catalog.insert_task(task.clone())).await?;

        // Step 7: run the pipeline and write back the terminal state.
        let outcome = pipeline::run(PipelineInputs {
            object_store: &self.object_store,
            original_key: &envelope.storage_key,
            image_id: envelope.image_id,
            watermark_id: &watermark_id,
            epsilon: self.config.perturbation_epsilon,
            steps: self.config.perturbation_steps,
            model: &self.model,
            signer: &self.signer,
        })
        .await;

        match outcome {
            Ok(outcome) => {
                let manifest = serde_json::to_value(&outcome.provenance_manifest)?;
                retry_catalog(|| {
                    self.catalog
                        .set_completed(envelope.image_id, &outcome.protected_key, manifest.clone())
                })
                .await?;
                retry_catalog(|| self.catalog.complete_task(task_id)).await?;
                self.metrics.record_success();
                log::info!(
                    "[worker:{}] image {} completed ({})",
                    self.worker_id,
                    envelope.image_id,
                    outcome.protected_key
                );
            }
            Err(err) => {
                let error_log = error_log_for(&err);
                retry_catalog(|| self.catalog.set_failed(envelope.image_id, &error_log)).await?;
                retry_catalog(|| self.catalog.fail_task(task_id, &error_log)).await?;
                self.metrics.record_failure();
                log::warn!(
                    "[worker:{}] image {} failed: {error_log}",
                    self.worker_id,
                    envelope.image_id
                );
            }
        }

        Ok(())
    }
}

fn error_log_for(err: &CoreError) -> String {
    err.as_stage_error_log()
        .unwrap_or_else(|| lore_anchor_shared::models::truncate_error_log(&err.to_string()))
}

/// Bounded-exponential retry for Catalog writes (spec §7: "3 attempts,
/// jittered 1-10 s"). `InvalidTransition` is never retried — it is a
/// legitimate race outcome, not a transient dependency failure.
async fn retry_catalog<F, Fut, T>(mut op: F) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CatalogError>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(CatalogError::InvalidTransition { from, to }) => {
                return Err(CatalogError::InvalidTransition { from, to });
            }
            Err(e) if attempt >= MAX_ATTEMPTS => return Err(e),
            Err(e) => {
                let jitter_secs = rand::thread_rng().gen_range(1..=10);
                log::warn!(
                    "[worker] catalog write failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}; retrying in {jitter_secs}s"
                );
                tokio::time::sleep(Duration::from_secs(jitter_secs)).await;
            }
        }
    }
}
