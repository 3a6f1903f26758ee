//! The typed UI component tree accepted into snapshot history.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node of a generated interface tree.
///
/// Nodes only exist in this form after passing [`super::validate_plan`], so
/// `kind` is always a non-empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    /// Name of the UI primitive or component (e.g. `Box`, `Text`).
    pub kind: String,
    /// Property bag; primitives or nested values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
    /// Ordered child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiNode>,
    /// Fields the validator does not interpret. Preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UiNode {
    /// Build a leaf node with no props.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: None,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Append a child, builder style.
    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set a single prop, builder style.
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(UiNode::node_count).sum::<usize>()
    }

    /// Depth of this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(UiNode::depth).max().unwrap_or(0)
    }
}

/// Count every node across a sequence of roots.
pub fn count_nodes(plan: &[UiNode]) -> usize {
    plan.iter().map(UiNode::node_count).sum()
}
