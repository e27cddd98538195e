//! `GET /health` on `health_port` (spec §4.4). A tiny axum server run
//! alongside the outer consume loop — grounded in the gateway's own
//! `GET /health` handler in `main.rs`, the same shape used here for the
//! worker's fleet-controller probe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub struct WorkerMetrics {
    worker_id: String,
    started_at: Instant,
    processing: AtomicBool,
    images_processed: AtomicU64,
    images_failed: AtomicU64,
}

impl WorkerMetrics {
    pub fn new(worker_id: String) -> Arc<Self> {
        Arc::new(Self {
            worker_id,
            started_at: Instant::now(),
            processing: AtomicBool::new(false),
            images_processed: AtomicU64::new(0),
            images_failed: AtomicU64::new(0),
        })
    }

    pub fn set_processing(&self, value: bool) {
        self.processing.store(value, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.images_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.images_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Value {
        json!({
            "status": "ok",
            "worker_id": self.worker_id,
            "processing": self.processing.load(Ordering::Relaxed),
            "images_processed": self.images_processed.load(Ordering::Relaxed),
            "images_failed": self.images_failed.load(Ordering::Relaxed),
            "uptime_s": self.started_at.elapsed().as_secs(),
        })
    }
}

async fn health_handler(State(metrics): State<Arc<WorkerMetrics>>) -> Json<Value> {
    Json(metrics.snapshot())
}

/// Serve `/health` on `port` until the process exits. Spawned as its own
/// task; the outer consume loop does not depend on it.
pub async fn serve(metrics: Arc<WorkerMetrics>, port: u16) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(metrics);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("[health] listening on :{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = WorkerMetrics::new("worker-test".to_string());
        metrics.set_processing(true);
        metrics.record_success();
        metrics.record_failure();
        let snap = metrics.snapshot();
        assert_eq!(snap["worker_id"], "worker-test");
        assert_eq!(snap["processing"], true);
        assert_eq!(snap["images_processed"], 1);
        assert_eq!(snap["images_failed"], 1);
    }
}
