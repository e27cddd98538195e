//! Test-only helpers shared by the integration tests below, following the
//! teacher's `create_mock_shared_state` shape in `src/test/login_test.rs`.

mod integration_tests;

use std::sync::Arc;

use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;

use lore_anchor_shared::catalog::{InMemoryCatalog, SharedCatalog};
use lore_anchor_shared::objectstore::{ObjectStoreBackend, ObjectStoreService};
use lore_anchor_shared::queue::{InMemoryQueue, WorkQueue};

use crate::auth::Auth;
use crate::config::AppConfig;
use crate::quota::StaticPlanProvider;
use crate::state::AppState;

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    exp: usize,
}

pub fn build_state() -> Arc<AppState> {
    let config = AppConfig::for_tests();
    let auth = Auth::new(config.jwt_secret.as_bytes());
    let catalog: SharedCatalog = Arc::new(InMemoryCatalog::new());
    let queue: Arc<dyn WorkQueue> = Arc::new(InMemoryQueue::new());
    let object_store = ObjectStoreService::new(ObjectStoreBackend::Memory).unwrap();
    let plan_provider = StaticPlanProvider::all_free();
    Arc::new(AppState::new(config, auth, catalog, queue, object_store, plan_provider))
}

pub fn token_for(state: &AppState, owner_id: &str) -> String {
    let claims = TestClaims {
        sub: owner_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
    0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00,
    0x00, 0x00, 0x03, 0x00, 0x01, 0x8A, 0x07, 0x91, 0x37, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E,
    0x44, 0xAE, 0x42, 0x60, 0x82,
];
