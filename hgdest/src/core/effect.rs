//! Mapping from a pushed revision to the effect record reported upstream.

use crate::core::types::{DestinationEffect, DestinationRef, EffectType, TransformResult};

/// Kind recorded in every destination reference produced by this writer.
pub const COMMIT_KIND: &str = "commit";

/// Build the `Created` effect for a revision pushed to `url`.
pub fn to_effect(tip: &str, transform: &TransformResult, url: &str) -> DestinationEffect {
    DestinationEffect {
        effect_type: EffectType::Created,
        summary: format!("Created revision {tip}"),
        origin_refs: transform.changes.clone(),
        destination_ref: DestinationRef {
            id: tip.to_string(),
            kind: COMMIT_KIND.to_string(),
            url: url.to_string(),
        },
    }
}
