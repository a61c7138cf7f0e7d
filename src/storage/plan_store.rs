//! Plan persistence port

use async_trait::async_trait;

use crate::error::Result;
use crate::plan::Plan;

/// Stores one record per Plan id.
///
/// `save` overwrites any previous record with the same id, so saving the same
/// plan repeatedly is safe. `load` fails with `ArcaneError::PlanNotFound` for
/// unknown ids.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn save(&self, plan: &Plan) -> Result<()>;

    async fn load(&self, id: &str) -> Result<Plan>;

    /// All stored plans, most recently updated first
    async fn list(&self) -> Result<Vec<Plan>>;

    async fn exists(&self, id: &str) -> Result<bool> {
        match self.load(id).await {
            Ok(_) => Ok(true),
            Err(crate::error::ArcaneError::PlanNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
