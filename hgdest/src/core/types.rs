//! Shared types passed between the pipeline, the writer, and its reporters.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Label naming the Mercurial revision a change was imported from, when this
/// repository acts as an origin for another migration.
pub const HG_ORIGIN_REV_ID: &str = "HgOrigin-RevId";

/// Revision of the origin repository that produced a transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginRevision {
    /// Trailer label under which the revision is recorded (e.g. `GitOrigin-RevId`).
    pub label_name: String,
    /// Serialized revision value.
    pub value: String,
}

/// Reference to a change in the origin that was migrated by this write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginRef {
    pub id: String,
}

impl OriginRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Output of the upstream transformation, consumed once per write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Directory holding the transformed tree to publish.
    pub workdir: PathBuf,
    /// Commit author, e.g. `Jane Doe <jane@example.com>`.
    pub author: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Free-text commit summary, possibly already carrying trailer labels.
    pub summary: String,
    pub origin_revision: Option<OriginRevision>,
    /// Origin changes included in this write.
    pub changes: Vec<OriginRef>,
}

/// File-level operation needed to bring the checkout in line with the workdir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiffOp {
    Add,
    Modified,
    Delete,
}

/// A differing path and the operation that resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    pub op: DiffOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectType {
    Created,
}

/// Where a write landed in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRef {
    pub id: String,
    pub kind: String,
    pub url: String,
}

/// Structured record of a successful write, reported to the outer pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationEffect {
    #[serde(rename = "type")]
    pub effect_type: EffectType,
    pub summary: String,
    pub origin_refs: Vec<OriginRef>,
    pub destination_ref: DestinationRef,
}
