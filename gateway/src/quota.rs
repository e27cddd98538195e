//! Quota enforcement boundary. Spec §4.1 "Quota enforcement" and §1:
//! billing/subscription state is an external collaborator, out of scope for
//! this core — only the boundary trait the gateway consults is specified
//! here, plus a static stand-in so the gateway is runnable without a real
//! billing integration wired up.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTier {
    Free,
    Pro,
}

#[async_trait]
pub trait PlanProvider: Send + Sync {
    async fn tier_for(&self, owner_id: &str) -> PlanTier;
}

/// Stand-in for the billing collaborator: every owner is Free tier unless
/// explicitly listed as Pro. A real deployment swaps this for a client of
/// whatever billing service owns subscription state — the gateway only
/// ever depends on the `PlanProvider` trait.
pub struct StaticPlanProvider {
    pro_owners: Vec<String>,
}

impl StaticPlanProvider {
    pub fn new(pro_owners: Vec<String>) -> Self {
        Self { pro_owners }
    }

    pub fn all_free() -> Self {
        Self { pro_owners: Vec::new() }
    }
}

#[async_trait]
impl PlanProvider for StaticPlanProvider {
    async fn tier_for(&self, owner_id: &str) -> PlanTier {
        if self.pro_owners.iter().any(|o| o == owner_id) {
            PlanTier::Pro
        } else {
            PlanTier::Free
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlisted_owner_is_free_tier() {
        let provider = StaticPlanProvider::all_free();
        assert_eq!(provider.tier_for("owner-1").await, PlanTier::Free);
    }

    #[tokio::test]
    async fn listed_owner_is_pro_tier() {
        let provider = StaticPlanProvider::new(vec!["owner-2".to_string()]);
        assert_eq!(provider.tier_for("owner-2").await, PlanTier::Pro);
        assert_eq!(provider.tier_for("owner-1").await, PlanTier::Free);
    }
}
