//! Commit message composition with trailer labels.
//!
//! A message is a free-text body followed by an optional trailer block of
//! `name<separator>value` lines, separated from the body by a blank line:
//!
//! ```text
//! Fix the frobnicator
//!
//! Longer description.
//!
//! GitOrigin-RevId: 2f1c9e0
//! Reviewed-by: someone
//! ```
//!
//! The trailer block is the last paragraph, and only when every line of it
//! looks like a label.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::TransformResult;

/// Separator used for the origin revision label unless configured otherwise.
pub const DEFAULT_LABEL_SEPARATOR: &str = ": ";

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+)( *[:=] ?)(.*)$").expect("label regex"));

/// A single trailer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub separator: String,
    pub value: String,
}

impl Label {
    pub fn new(
        name: impl Into<String>,
        separator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            separator: separator.into(),
            value: value.into(),
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let caps = LABEL_RE.captures(line)?;
        Some(Self::new(&caps[1], &caps[2], &caps[3]))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.separator, self.value)
    }
}

/// Parsed commit message: body plus ordered trailer labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeMessage {
    body: String,
    labels: Vec<Label>,
}

impl ChangeMessage {
    /// Split `text` into body and trailer labels.
    pub fn parse(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let trimmed = normalized.trim_end();
        if trimmed.is_empty() {
            return Self::default();
        }

        // A trailer is only ever the last paragraph after a blank line; a lone
        // paragraph is the subject even when it looks like `type: subject`.
        let Some((body, block)) = trimmed.rsplit_once("\n\n") else {
            return Self {
                body: trimmed.to_string(),
                labels: Vec::new(),
            };
        };
        let body = body.trim_end();
        match parse_label_block(block) {
            Some(labels) => Self {
                body: body.to_string(),
                labels,
            },
            None => Self {
                body: trimmed.to_string(),
                labels: Vec::new(),
            },
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Values of every label named `name`, in trailer order.
    pub fn label_values(&self, name: &str) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|label| label.name == name)
            .map(|label| label.value.as_str())
            .collect()
    }

    /// Set `name` to `value`, replacing an existing label of that name in place
    /// or appending a new one after the existing trailers.
    ///
    /// Duplicate occurrences of `name` collapse into the first one.
    pub fn with_new_or_replaced_label(mut self, name: &str, separator: &str, value: &str) -> Self {
        let mut replaced = false;
        self.labels.retain_mut(|label| {
            if label.name != name {
                return true;
            }
            if replaced {
                return false;
            }
            label.separator = separator.to_string();
            label.value = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            self.labels.push(Label::new(name, separator, value));
        }
        self
    }
}

impl fmt::Display for ChangeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            if self.body.is_empty() {
                return Ok(());
            }
            return writeln!(f, "{}", self.body);
        }
        // An empty body still gets the blank line so the labels parse back as a trailer.
        write!(f, "{}\n\n", self.body)?;
        for label in &self.labels {
            writeln!(f, "{label}")?;
        }
        Ok(())
    }
}

fn parse_label_block(block: &str) -> Option<Vec<Label>> {
    block.lines().map(Label::parse).collect()
}

/// Parse `summary` and upsert every label in `labels`, in order.
pub fn build_change_message(summary: &str, labels: &[Label]) -> ChangeMessage {
    labels
        .iter()
        .fold(ChangeMessage::parse(summary), |msg, label| {
            msg.with_new_or_replaced_label(&label.name, &label.separator, &label.value)
        })
}

/// Labels to upsert for `transform`: its origin revision, if it carries one.
pub fn origin_labels(transform: &TransformResult, separator: &str) -> Vec<Label> {
    transform
        .origin_revision
        .iter()
        .map(|rev| Label::new(&rev.label_name, separator, &rev.value))
        .collect()
}
