//! Identifier normalization.
//!
//! The mapping service is an external collaborator; this module owns the
//! client for it and the in-place rewrite of query-graph node identifiers.
//! A CURIE with no known mapping is left untouched and reported as a value,
//! never as an error — only a failure of the service itself aborts the
//! pipeline.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::RelayError;
use crate::query::Query;

/// Outcome of one normalization pass. `unmapped` identifiers stayed
/// verbatim in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub requested: usize,
    pub mapped: usize,
    pub unmapped: Vec<String>,
}

#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Rewrite identifiers in `query` to canonical form, in place.
    ///
    /// Must be invoked before the first stage call. Returning `Err` is
    /// pipeline-fatal; missing mappings for individual identifiers are not.
    async fn normalize(&self, query: &mut Query) -> Result<NormalizationReport, RelayError>;
}

/// No-op normalizer for deployments without a mapping service and for
/// tests. Reports nothing requested, leaves the document untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Normalizer for Passthrough {
    async fn normalize(&self, _query: &mut Query) -> Result<NormalizationReport, RelayError> {
        Ok(NormalizationReport::default())
    }
}

/// HTTP-backed normalizer speaking the node-normalization protocol:
/// `POST {"curies": [...], "conflate": true}` answered by a map from each
/// submitted CURIE to `{"id": {"identifier": ..., "label": ...}, ...}`, or
/// `null` when the service knows no canonical form.
pub struct NodeNormalizer {
    client: Client,
    url: Url,
}

impl NodeNormalizer {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    async fn fetch_mappings(&self, curies: &[String]) -> Result<Value, RelayError> {
        let body = serde_json::json!({ "curies": curies, "conflate": true });
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Normalize(format!("failed to reach {}: {e}", self.url)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(RelayError::Normalize(format!(
                "mapping service answered {status}: {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RelayError::Normalize(format!("mapping service returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl Normalizer for NodeNormalizer {
    async fn normalize(&self, query: &mut Query) -> Result<NormalizationReport, RelayError> {
        let curies = query.pinned_ids();
        if curies.is_empty() {
            return Ok(NormalizationReport::default());
        }
        let mappings = self.fetch_mappings(&curies).await?;
        Ok(apply_mappings(query, &mappings))
    }
}

/// The canonical identifier for `curie` in a mapping document, if the
/// service knows one.
fn canonical_id(mappings: &Value, curie: &str) -> Option<String> {
    mappings
        .get(curie)?
        .get("id")?
        .get("identifier")?
        .as_str()
        .map(str::to_string)
}

/// Rewrite node identifiers in place from a mapping document.
///
/// Pure over its inputs so it can be exercised without a live service.
fn apply_mappings(query: &mut Query, mappings: &Value) -> NormalizationReport {
    let mut report = NormalizationReport::default();
    let Some(graph) = query.message.query_graph.as_mut() else {
        return report;
    };
    for node in graph.nodes.values_mut() {
        let Some(ids) = node.ids.as_mut() else { continue };
        for id in ids.iter_mut() {
            report.requested += 1;
            match canonical_id(mappings, id) {
                Some(canonical) => {
                    if canonical != *id {
                        tracing::trace!(from = %id, to = %canonical, "rewrote identifier");
                    }
                    *id = canonical;
                    report.mapped += 1;
                }
                None => report.unmapped.push(id.clone()),
            }
        }
    }
    report
}
