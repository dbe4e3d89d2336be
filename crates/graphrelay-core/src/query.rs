//! Query and answer documents.
//!
//! Deserializing the inbound body into [`Query`] is the structural
//! validation step: a body without a `message` (or with query-graph nodes of
//! the wrong shape) is rejected before any outbound call. Unknown fields are
//! carried in flattened `extra` maps so a document's shape survives the
//! round trip — the pipeline only ever rewrites node identifiers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Inbound knowledge-graph question envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub message: Message,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Final enriched answer envelope, revalidated from the scoring stage's
/// output before it is returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_graph: Option<QueryGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryGraph {
    #[serde(default)]
    pub nodes: BTreeMap<String, QueryNode>,
    #[serde(default)]
    pub edges: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryNode {
    /// Pinned identifiers (CURIEs) for this node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    /// Every pinned identifier in the query graph, deduplicated, in
    /// document order. This is exactly the set the normalizer submits to
    /// the mapping service.
    pub fn pinned_ids(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        let Some(graph) = self.message.query_graph.as_ref() else {
            return out;
        };
        for node in graph.nodes.values() {
            let Some(ids) = node.ids.as_ref() else { continue };
            for id in ids {
                if seen.insert(id.clone()) {
                    out.push(id.clone());
                }
            }
        }
        out
    }
}
