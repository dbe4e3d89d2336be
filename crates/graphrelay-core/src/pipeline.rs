//! The relay chain: normalize, then lookup → overlay → weighting → scoring.

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;

use crate::error::RelayError;
use crate::normalize::{NormalizationReport, Normalizer};
use crate::query::Query;
use crate::stage::{call_stage, Stage, StageEndpoints};

/// Orchestrates one traversal of the fixed stage chain.
///
/// Stateless across requests: the reqwest client is shared and pooled, the
/// endpoints and normalizer are configuration. One `run` call corresponds to
/// one inbound query and holds no state the next call can observe.
pub struct Pipeline {
    client: Client,
    endpoints: StageEndpoints,
    normalizer: Arc<dyn Normalizer>,
}

impl Pipeline {
    pub fn new(client: Client, endpoints: StageEndpoints, normalizer: Arc<dyn Normalizer>) -> Self {
        Self {
            client,
            endpoints,
            normalizer,
        }
    }

    pub fn endpoints(&self) -> &StageEndpoints {
        &self.endpoints
    }

    /// Run one query document through normalization and the full chain.
    ///
    /// Each stage's parsed output becomes the next stage's input verbatim;
    /// the scoring output is the final answer. The first failure aborts the
    /// chain — later stages are never invoked, and there is no retry, no
    /// reordering, and no partial result.
    pub async fn run(&self, mut query: Query) -> Result<Value, RelayError> {
        let report = self.normalizer.normalize(&mut query).await?;
        log_report(&report);

        let mut payload = serde_json::to_value(&query)
            .map_err(|e| RelayError::Internal(format!("failed to serialize normalized query: {e}")))?;

        for stage in Stage::ALL {
            payload = call_stage(&self.client, stage, self.endpoints.url(stage), &payload).await?;
        }
        Ok(payload)
    }
}

fn log_report(report: &NormalizationReport) {
    if !report.unmapped.is_empty() {
        tracing::warn!(
            unmapped = report.unmapped.len(),
            ids = ?report.unmapped,
            "no canonical mapping for some identifiers; relaying them as-is"
        );
    }
    if report.requested > 0 {
        tracing::debug!(
            mapped = report.mapped,
            requested = report.requested,
            "normalized query identifiers"
        );
    }
}
