//! One outbound call to one downstream reasoning service.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::RelayError;

/// The four relay stages, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Lookup,
    Overlay,
    Weighting,
    Scoring,
}

impl Stage {
    /// Chain order. The orchestrator walks this slice front to back and
    /// never skips or reorders.
    pub const ALL: [Stage; 4] = [Stage::Lookup, Stage::Overlay, Stage::Weighting, Stage::Scoring];

    /// Short machine-facing name (log fields, status payloads).
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Lookup => "lookup",
            Stage::Overlay => "overlay",
            Stage::Weighting => "weighting",
            Stage::Scoring => "scoring",
        }
    }

    /// Label used in client-visible failure messages ("Failed doing lookup: ...").
    pub fn gerund(&self) -> &'static str {
        match self {
            Stage::Lookup => "doing lookup",
            Stage::Overlay => "doing overlay",
            Stage::Weighting => "doing weighting",
            Stage::Scoring => "doing scoring",
        }
    }
}

/// Downstream endpoints, one per stage.
#[derive(Debug, Clone)]
pub struct StageEndpoints {
    pub lookup: Url,
    pub overlay: Url,
    pub weighting: Url,
    pub scoring: Url,
}

impl StageEndpoints {
    pub fn url(&self, stage: Stage) -> &Url {
        match stage {
            Stage::Lookup => &self.lookup,
            Stage::Overlay => &self.overlay,
            Stage::Weighting => &self.weighting,
            Stage::Scoring => &self.scoring,
        }
    }
}

/// Issue exactly one POST of `payload` to `url`.
///
/// Status 200 is the sole success criterion; any other status captures the
/// remote body text verbatim in a stage-attributed error. A 200 response
/// whose body is not JSON is an unexpected failure, not a stage failure.
/// No retries, no query parameters, no timeout beyond what the client was
/// built with.
pub async fn call_stage(
    client: &Client,
    stage: Stage,
    url: &Url,
    payload: &Value,
) -> Result<Value, RelayError> {
    tracing::debug!(stage = stage.name(), url = %url, "calling downstream stage");

    let response = client.post(url.clone()).json(payload).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::Stage {
            stage,
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| RelayError::InvalidResponse { stage, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_order_is_fixed() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["lookup", "overlay", "weighting", "scoring"]);
    }

    #[test]
    fn gerunds_match_client_labels() {
        assert_eq!(Stage::Lookup.gerund(), "doing lookup");
        assert_eq!(Stage::Overlay.gerund(), "doing overlay");
        assert_eq!(Stage::Weighting.gerund(), "doing weighting");
        assert_eq!(Stage::Scoring.gerund(), "doing scoring");
    }

    #[test]
    fn endpoints_map_each_stage_to_its_url() {
        let endpoints = StageEndpoints {
            lookup: Url::parse("http://a.example/lookup").unwrap(),
            overlay: Url::parse("http://b.example/overlay").unwrap(),
            weighting: Url::parse("http://c.example/weight").unwrap(),
            scoring: Url::parse("http://d.example/score").unwrap(),
        };
        for stage in Stage::ALL {
            assert!(endpoints.url(stage).path().contains(match stage {
                Stage::Lookup => "lookup",
                Stage::Overlay => "overlay",
                Stage::Weighting => "weight",
                Stage::Scoring => "score",
            }));
        }
    }
}
