//! In-process plan store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::plan_store::PlanStore;
use crate::error::{ArcaneError, Result};
use crate::plan::Plan;

/// Keeps plans in a map; also counts saves so checkpointing can be observed.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, Plan>>,
    saves: RwLock<Vec<String>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan ids in save order, one entry per save
    pub async fn save_log(&self) -> Vec<String> {
        self.saves.read().await.clone()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save(&self, plan: &Plan) -> Result<()> {
        self.plans.write().await.insert(plan.id.clone(), plan.clone());
        self.saves.write().await.push(plan.id.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        self.plans
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ArcaneError::PlanNotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Plan>> {
        let mut plans: Vec<Plan> = self.plans.read().await.values().cloned().collect();
        plans.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(plans)
    }
}
