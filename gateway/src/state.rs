//! Root application context (spec §9 "Cyclic/singleton services" REDESIGN
//! FLAG): constructed once at startup and passed explicitly into every
//! handler via axum's `State` extractor, rather than reached through
//! process-global singletons.

use std::sync::Arc;

use lore_anchor_shared::catalog::SharedCatalog;
use lore_anchor_shared::objectstore::ObjectStoreService;
use lore_anchor_shared::queue::WorkQueue;

use crate::auth::Auth;
use crate::config::AppConfig;
use crate::presign::Presigner;
use crate::quota::StaticPlanProvider;
use crate::ratelimit::RateLimiter;

pub struct AppState {
    pub config: AppConfig,
    pub auth: Auth,
    pub catalog: SharedCatalog,
    pub queue: Arc<dyn WorkQueue>,
    pub object_store: ObjectStoreService,
    pub plan_provider: StaticPlanProvider,
    pub presigner: Presigner,
    pub upload_rate_limiter: RateLimiter,
    pub read_rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        auth: Auth,
        catalog: SharedCatalog,
        queue: Arc<dyn WorkQueue>,
        object_store: ObjectStoreService,
        plan_provider: StaticPlanProvider,
    ) -> Self {
        let upload_rate_limiter = RateLimiter::new(config.rate_limit_uploads_per_minute);
        let read_rate_limiter = RateLimiter::new(config.rate_limit_reads_per_minute);
        let presigner = Presigner::new(config.jwt_secret.as_bytes(), config.object_store_public_base.clone());
        Self {
            config,
            auth,
            catalog,
            queue,
            object_store,
            plan_provider,
            presigner,
            upload_rate_limiter,
            read_rate_limiter,
        }
    }
}
