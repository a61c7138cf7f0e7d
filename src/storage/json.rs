//! One pretty-printed JSON file per plan

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::plan_store::PlanStore;
use crate::error::{ArcaneError, Result};
use crate::plan::Plan;

/// Writes `<base>/<plan id>.json`, replacing it atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonPlanStore {
    base_path: PathBuf,
}

impl JsonPlanStore {
    /// Create the store, creating the directory if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn plan_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(ArcaneError::Storage(format!("Invalid plan id: {:?}", id)));
        }
        Ok(self.base_path.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl PlanStore for JsonPlanStore {
    async fn save(&self, plan: &Plan) -> Result<()> {
        let path = self.plan_path(&plan.id)?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(plan)?;

        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::debug!("Saved plan {} to {}", plan.id, path.display());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        let path = self.plan_path(id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArcaneError::PlanNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn list(&self) -> Result<Vec<Plan>> {
        let mut plans = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Plan>(&content) {
                Ok(plan) => plans.push(plan),
                Err(e) => log::warn!("Skipping unreadable plan file {}: {}", path.display(), e),
            }
        }
        plans.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(plans)
    }
}
