//! Plan stores — one JSON document per plan, keyed by plan id.
//!
//! Storage location: `~/.stepwise/plans/<plan_id>.json`
//!
//! Writes go to a temporary sibling file which is then renamed over the
//! target, so a crash mid-write leaves the previous version intact. There
//! is no locking: two processes saving the same plan id race, and the last
//! rename wins.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use stepwise_core::error::PlanError;
use stepwise_core::plan::{Plan, PlanStore};
use stepwise_core::session::is_safe_key;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A directory of plan documents.
pub struct FilePlanStore {
    dir: PathBuf,
}

impl FilePlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, plan_id: &str) -> Result<PathBuf, PlanError> {
        if !is_safe_key(plan_id) {
            return Err(PlanError::Store(format!("invalid plan id '{plan_id}'")));
        }
        Ok(self.dir.join(format!("{plan_id}.json")))
    }
}

#[async_trait]
impl PlanStore for FilePlanStore {
    async fn save(&self, plan: &Plan) -> Result<(), PlanError> {
        let path = self.path_for(&plan.plan_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PlanError::Store(format!("Failed to create plan directory: {e}")))?;

        let json = serde_json::to_string_pretty(plan)
            .map_err(|e| PlanError::Store(format!("Failed to serialize plan: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| PlanError::Store(format!("Failed to write plan: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PlanError::Store(format!("Failed to replace plan file: {e}")))?;

        debug!(plan_id = %plan.plan_id, path = %path.display(), "Plan saved");
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> Result<Option<Plan>, PlanError> {
        let path = self.path_for(plan_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PlanError::Store(format!("Failed to read plan: {e}"))),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PlanError::Store(format!("Plan {plan_id} is corrupted: {e}")))
    }

    async fn list(&self) -> Result<Vec<Plan>, PlanError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PlanError::Store(format!("Failed to list plans: {e}"))),
        };

        let mut plans = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| PlanError::Store(format!("Failed to list plans: {e}")))?
        {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str::<Plan>(&c).map_err(|e| e.to_string()));
            match parsed {
                Ok(plan) => plans.push(plan),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable plan"),
            }
        }
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }
}

/// Plans kept in a map. Useful for tests and dry runs.
#[derive(Default)]
pub struct InMemoryPlanStore {
    plans: Arc<RwLock<HashMap<String, Plan>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save(&self, plan: &Plan) -> Result<(), PlanError> {
        self.plans
            .write()
            .await
            .insert(plan.plan_id.clone(), plan.clone());
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> Result<Option<Plan>, PlanError> {
        Ok(self.plans.read().await.get(plan_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Plan>, PlanError> {
        let mut plans: Vec<Plan> = self.plans.read().await.values().cloned().collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }
}
