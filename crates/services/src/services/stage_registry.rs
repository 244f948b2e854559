//! Loads the board's stage columns, degrading to the built-in list.

use std::collections::HashSet;

use db::models::stage::{Stage, fallback_stages};
use tracing::{debug, warn};

use super::board_api::BoardApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageLoad {
    pub stages: Vec<Stage>,
    pub source: StageSource,
}

impl StageLoad {
    pub fn is_fallback(&self) -> bool {
        self.source == StageSource::Fallback
    }

    pub fn slugs(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.slug.clone()).collect()
    }

    /// Stage new projects land in.
    pub fn default_stage(&self) -> Option<&Stage> {
        self.stages
            .iter()
            .find(|s| s.is_default)
            .or_else(|| self.stages.first())
    }

    fn fallback() -> Self {
        Self {
            stages: fallback_stages(),
            source: StageSource::Fallback,
        }
    }
}

/// Fetch and normalise the stage list. Never fails: transport errors and empty
/// results both yield the built-in columns, flagged as [`StageSource::Fallback`].
pub async fn load_stages(api: &dyn BoardApi) -> StageLoad {
    let stages = match api.fetch_stages().await {
        Ok(stages) => stages,
        Err(e) => {
            warn!(error = %e, "Stage fetch failed, using built-in stages");
            return StageLoad::fallback();
        }
    };

    let stages = normalize(stages);
    if stages.is_empty() {
        warn!("No stages configured, using built-in stages");
        return StageLoad::fallback();
    }

    debug!(count = stages.len(), "Loaded stages");
    StageLoad {
        stages,
        source: StageSource::Remote,
    }
}

/// Order by `sort_order` and drop repeated slugs (first wins).
fn normalize(mut stages: Vec<Stage>) -> Vec<Stage> {
    stages.sort_by_key(|s| s.sort_order);
    let mut seen = HashSet::new();
    stages.retain(|stage| {
        let fresh = seen.insert(stage.slug.clone());
        if !fresh {
            warn!(slug = %stage.slug, "Dropping stage with duplicate slug");
        }
        fresh
    });
    stages
}
