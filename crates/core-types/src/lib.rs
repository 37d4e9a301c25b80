use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the axe-mode crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AxeModeError {
    #[error("{message}")]
    Message { message: String },
}

impl AxeModeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Reference identity of the watched subtree root.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SubtreeRef(pub String);

impl SubtreeRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SubtreeRef {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SubtreeRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SubtreeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub String);

impl MarkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic audit cycle counter. Cycle 0 means no audit has completed yet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CycleId(pub u64);

impl CycleId {
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle#{}", self.0)
    }
}

/// On-screen rectangle in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@({},{})",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Separator used when a nested selector path (frames, shadow roots) is flattened.
pub const NESTED_SELECTOR_SEPARATOR: &str = " >>> ";

/// Opaque selector naming an element inside the watched subtree.
///
/// Used purely as a join key; it never holds an element reference, so it
/// survives re-audits where the element itself was recreated.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TargetSelector(pub String);

impl TargetSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetSelector {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TargetSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Plain(String),
    Nested(Vec<String>),
}

impl<'de> Deserialize<'de> for TargetSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawSelector::deserialize(deserializer)? {
            RawSelector::Plain(selector) => Ok(Self(selector)),
            RawSelector::Nested(path) => Ok(Self(path.join(NESTED_SELECTOR_SEPARATOR))),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    #[serde(alias = "serious")]
    Severe,
    Critical,
}

impl Impact {
    pub fn label(self) -> &'static str {
        match self {
            Impact::Minor => "minor",
            Impact::Moderate => "moderate",
            Impact::Severe => "severe",
            Impact::Critical => "critical",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Engines emit `null` for empty check groups and node lists; read it as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Check {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
}

impl Check {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// One element a violation was reported against, with the checks evaluated on it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AffectedNode {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub target: Vec<TargetSelector>,
    /// Checks where at least one must pass.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub any: Vec<Check>,
    /// Checks that all must pass.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub all: Vec<Check>,
}

impl AffectedNode {
    pub fn targets(&self, selector: &TargetSelector) -> bool {
        self.target.contains(selector)
    }
}

/// A single accessibility rule failure as reported by the audit engine.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub help: String,
    #[serde(default, rename = "helpUrl")]
    pub help_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<AffectedNode>,
}

impl Violation {
    pub fn affects(&self, selector: &TargetSelector) -> bool {
        self.nodes.iter().any(|node| node.targets(selector))
    }

    /// First affected node whose target list contains `selector`.
    pub fn node_for(&self, selector: &TargetSelector) -> Option<&AffectedNode> {
        self.nodes.iter().find(|node| node.targets(selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn violation_parses_engine_schema() {
        let raw = json!({
            "id": "image-alt",
            "impact": "serious",
            "help": "Images must have alternate text",
            "helpUrl": "https://example.test/image-alt",
            "tags": ["wcag2a"],
            "nodes": [{
                "target": ["#hey"],
                "any": [{"id": "has-alt", "message": "Element does not have an alt attribute"}],
                "all": [],
                "html": "<img id=\"hey\">"
            }]
        });
        let violation: Violation = serde_json::from_value(raw).unwrap();
        assert_eq!(violation.impact, Some(Impact::Severe));
        assert_eq!(violation.help_url, "https://example.test/image-alt");
        assert_eq!(violation.nodes[0].any[0].id, "has-alt");
        assert!(violation.affects(&TargetSelector::from("#hey")));
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let violation: Violation =
            serde_json::from_value(json!({"id": "B", "nodes": [{"target": ["#yo"]}]})).unwrap();
        assert!(violation.impact.is_none());
        assert!(violation.nodes[0].all.is_empty());
        assert!(violation.nodes[0].any.is_empty());

        let bare: Violation = serde_json::from_value(json!({"id": "C"})).unwrap();
        assert!(bare.nodes.is_empty());
    }

    #[test]
    fn nested_selector_path_is_flattened() {
        let node: AffectedNode =
            serde_json::from_value(json!({"target": [["iframe#app", "#inner"], "#plain"]}))
                .unwrap();
        assert_eq!(node.target[0].as_str(), "iframe#app >>> #inner");
        assert_eq!(node.target[1].as_str(), "#plain");
        assert_eq!(serde_json::to_value(&node.target[1]).unwrap(), json!("#plain"));
    }

    #[test]
    fn null_lists_read_as_empty() {
        let violation: Violation = serde_json::from_value(json!({
            "id": "A",
            "nodes": [{"target": null, "any": null, "all": null}]
        }))
        .unwrap();
        assert!(violation.nodes[0].target.is_empty());
        assert!(violation.nodes[0].any.is_empty());
        assert!(violation.nodes[0].all.is_empty());

        let bare: Violation = serde_json::from_value(json!({"id": "B", "nodes": null})).unwrap();
        assert!(bare.nodes.is_empty());
    }
}
