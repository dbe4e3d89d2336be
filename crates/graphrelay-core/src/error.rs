//! Relay error taxonomy.
//!
//! Two client-visible classes: failures attributed to one of the four
//! downstream stages, and everything else. Only `Stage` carries remote
//! diagnostic text and only `Stage` is reported with a stage label; the
//! rest surface through the boundary's generic envelope.

use crate::stage::Stage;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A downstream stage answered with a non-200 status.
    ///
    /// `body` is the remote response text verbatim, not re-parsed.
    #[error("Failed {}: {body}", .stage.gerund())]
    Stage {
        stage: Stage,
        status: u16,
        body: String,
    },

    /// The identifier-mapping service itself failed (transport error,
    /// non-200 status, unparseable mapping document). Individual unmapped
    /// identifiers are not errors and never reach this variant.
    #[error("identifier normalization failed: {0}")]
    Normalize(String),

    /// Network-level failure reaching a downstream service.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A stage returned 200 but a body that does not parse as JSON.
    #[error("{} returned an unparseable body: {source}", .stage.gerund())]
    InvalidResponse {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },

    /// Internal invariant failure (a bug, not a remote fault).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// The stage this error is attributed to for client-visible reporting.
    ///
    /// `InvalidResponse` knows which stage produced it but is deliberately
    /// not attributed: an unparseable success body is an unexpected failure
    /// and goes through the generic envelope.
    pub fn attributed_stage(&self) -> Option<Stage> {
        match self {
            RelayError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_message_embeds_label_and_body() {
        let err = RelayError::Stage {
            stage: Stage::Lookup,
            status: 503,
            body: "db unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Failed doing lookup: db unavailable");
        assert_eq!(err.attributed_stage(), Some(Stage::Lookup));
    }

    #[test]
    fn unparseable_success_body_is_not_stage_attributed() {
        let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = RelayError::InvalidResponse {
            stage: Stage::Overlay,
            source,
        };
        assert_eq!(err.attributed_stage(), None);
        assert!(err.to_string().contains("doing overlay"));
    }

    #[test]
    fn normalize_failure_is_not_stage_attributed() {
        let err = RelayError::Normalize("mapping service answered 500".to_string());
        assert_eq!(err.attributed_stage(), None);
    }
}
