//! Plain-text rendering of plans and snapshot history.

use std::fmt::Write as _;

use uigen_core::{Snapshot, SnapshotId, SnapshotStore, UiNode};

/// Longest prompt excerpt shown in history listings.
const PROMPT_PREVIEW_CHARS: usize = 48;

/// Indented outline of a plan, one node per line.
///
/// ```text
/// Box {"direction":"column"}
///   Text {"value":"Hello"}
/// ```
pub fn plan_outline(plan: &[UiNode]) -> String {
    let mut out = String::new();
    for node in plan {
        outline_node(&mut out, node, 0);
    }
    if out.is_empty() {
        out.push_str("(empty plan)\n");
    }
    out
}

fn outline_node(out: &mut String, node: &UiNode, depth: usize) {
    let _ = write!(out, "{:indent$}{}", "", node.kind, indent = depth * 2);
    if let Some(props) = node.props.as_ref().filter(|p| !p.is_empty()) {
        let _ = write!(out, " {}", serde_json::Value::Object(props.clone()));
    }
    out.push('\n');
    for child in &node.children {
        outline_node(out, child, depth + 1);
    }
}

/// Flat history listing in commit order.
///
/// ```text
/// > Snapshot 2  10:01:07  based on #1  make the button blue
/// ```
pub fn history_list(history: &[std::sync::Arc<Snapshot>], active: Option<SnapshotId>) -> String {
    if history.is_empty() {
        return "No generations yet\n".to_string();
    }
    let mut out = String::new();
    for snap in history {
        let _ = writeln!(out, "{}", history_line(snap, active));
    }
    out
}

fn history_line(snap: &Snapshot, active: Option<SnapshotId>) -> String {
    let marker = if Some(snap.id) == active { '>' } else { ' ' };
    let mut line = format!(
        "{marker} Snapshot {}  {}",
        snap.id,
        snap.created_at_display()
    );
    if let Some(parent) = snap.parent_id {
        let _ = write!(line, "  based on #{parent}");
    }
    let _ = write!(line, "  {}", preview(&snap.prompt));
    line
}

/// The version tree, children indented under their parent.
pub fn history_tree(store: &SnapshotStore) -> String {
    if store.is_empty() {
        return "No generations yet\n".to_string();
    }
    let mut out = String::new();
    for root in store.roots() {
        tree_node(&mut out, store, root, 0);
    }
    out
}

fn tree_node(out: &mut String, store: &SnapshotStore, snap: &Snapshot, depth: usize) {
    let marker = if store.active_id() == Some(snap.id) { '>' } else { ' ' };
    let _ = writeln!(
        out,
        "{marker} {:indent$}#{} {}",
        "",
        snap.id,
        preview(&snap.prompt),
        indent = depth * 2
    );
    for child in store.children(snap.id) {
        tree_node(out, store, child, depth + 1);
    }
}

fn preview(prompt: &str) -> String {
    let single_line = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PROMPT_PREVIEW_CHARS {
        single_line
    } else {
        let cut: String = single_line.chars().take(PROMPT_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    }
}
