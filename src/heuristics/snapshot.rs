//! Owned snapshot of a foreground app's UI tree.
//!
//! The platform boundary copies the live accessibility tree into this plain
//! structure once per event; classification then borrows the copy freely
//! and retains nothing across events, so no per-node release discipline
//! exists in the core.

use serde::{Deserialize, Serialize};

/// One element of a foreground UI snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiNode {
    pub role: String,
    pub text: Option<String>,
    pub identifier: Option<String>,
    pub selected: bool,
    pub editable: bool,
    pub scrollable: bool,
    pub children: Vec<UiNode>,
}

impl UiNode {
    /// True when the node's text contains `needle`, case-insensitively.
    pub fn text_contains(&self, needle: &str) -> bool {
        self.text
            .as_deref()
            .map(|text| contains_ignore_case(text, needle))
            .unwrap_or(false)
    }

    /// True when the node's view identifier contains `fragment`.
    pub fn identifier_contains(&self, fragment: &str) -> bool {
        self.identifier
            .as_deref()
            .map(|id| id.contains(fragment))
            .unwrap_or(false)
    }

    /// Depth-first visit of this node and all descendants.
    pub fn walk(&self, visit: &mut impl FnMut(&UiNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// True when any node in the tree satisfies the predicate.
    pub fn any(&self, pred: &impl Fn(&UiNode) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.children.iter().any(|child| child.any(pred))
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_node(text: &str) -> UiNode {
        UiNode {
            text: Some(text.to_string()),
            ..UiNode::default()
        }
    }

    #[test]
    fn test_text_contains_is_case_insensitive() {
        let node = text_node("YouTube Shorts");
        assert!(node.text_contains("shorts"));
        assert!(node.text_contains("SHORTS"));
        assert!(!node.text_contains("reels"));

        assert!(!UiNode::default().text_contains("shorts"));
    }

    #[test]
    fn test_any_reaches_nested_children() {
        let tree = UiNode {
            children: vec![UiNode {
                children: vec![text_node("deep")],
                ..UiNode::default()
            }],
            ..UiNode::default()
        };
        assert!(tree.any(&|n| n.text_contains("deep")));
        assert!(!tree.any(&|n| n.text_contains("missing")));
    }

    #[test]
    fn test_walk_visits_every_node() {
        let tree = UiNode {
            children: vec![text_node("a"), text_node("b")],
            ..UiNode::default()
        };
        let mut count = 0;
        tree.walk(&mut |_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_snapshot_deserializes_from_platform_json() {
        let tree: UiNode = serde_json::from_str(
            r#"{
                "role": "FrameLayout",
                "children": [
                    {"role": "Tab", "text": "Shorts", "selected": true},
                    {"role": "EditText", "editable": true, "text": "query"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(tree.children.len(), 2);
        assert!(tree.children[0].selected);
        assert!(tree.children[1].editable);
    }
}
