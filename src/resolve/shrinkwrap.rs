//! Frozen-dependency snapshots (shrinkwrap) and their inflation into tree
//! structure.
//!
//! Two very different failure policies apply. A snapshot file that cannot be
//! read or parsed at node-attach time is treated as "no snapshot present"
//! and never surfaces. A snapshot that parsed but contains an internally
//! inconsistent entry is a hard failure for that subtree, annotated with the
//! ancestor chain like any fetch failure.

use crate::error::ResolveError;
use crate::manifest::Manifest;
use crate::spec::RequestedSpec;
use crate::tree::node::{Node, NodeRef};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A parsed frozen-dependency snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shrinkwrap {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, ShrinkwrapEntry>,
}

/// One pinned dependency inside a snapshot. Entries nest arbitrarily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShrinkwrapEntry {
    /// The pinned version. Entries without one are malformed.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub resolved: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, ShrinkwrapEntry>,
}

/// Parse raw snapshot bytes. Malformed bytes are "no snapshot", per the
/// attach-time policy.
pub fn parse(bytes: &[u8]) -> Option<Shrinkwrap> {
    match serde_json::from_slice::<Shrinkwrap>(bytes) {
        Ok(shrinkwrap) => Some(shrinkwrap),
        Err(err) => {
            debug!(error = %err, "ignoring unparseable shrinkwrap");
            None
        }
    }
}

/// Materialize `entries` as children of `node`, recursing into nested
/// entries. An already-bundled child of the same name is reconciled instead
/// of duplicated. Inflated children are born loaded: their shape comes from
/// the snapshot alone, never from a fetch.
pub fn inflate(
    node: &NodeRef,
    entries: &BTreeMap<String, ShrinkwrapEntry>,
) -> Result<(), ResolveError> {
    for (name, entry) in entries {
        let version = parse_entry_version(name, entry).map_err(|err| err.required_by(node))?;

        let child = match bundled_child_named(node, name) {
            Some(existing) => {
                // Trust the vendored copy; the snapshot only contributes its
                // nested shape.
                existing
            }
            None => {
                let manifest = Manifest::with_version(name.clone(), version.clone());
                let child =
                    Node::attach_under(node, manifest, Some(RequestedSpec::exact(&version)));
                child.set_loaded();
                child.set_snapshot_checked();
                child.add_required_by(node.flat_name());
                child
            }
        };
        node.add_require(&child);

        if !entry.dependencies.is_empty() {
            inflate(&child, &entry.dependencies).map_err(|err| err.required_by(node))?;
        }
    }
    Ok(())
}

fn parse_entry_version(name: &str, entry: &ShrinkwrapEntry) -> Result<Version, ResolveError> {
    let raw = entry
        .version
        .as_deref()
        .ok_or_else(|| ResolveError::Shrinkwrap {
            name: name.to_string(),
            reason: "entry has no version".to_string(),
        })?;
    Version::parse(raw).map_err(|err| ResolveError::Shrinkwrap {
        name: name.to_string(),
        reason: format!("invalid version '{raw}': {err}"),
    })
}

fn bundled_child_named(node: &NodeRef, name: &str) -> Option<NodeRef> {
    node.children()
        .into_iter()
        .find(|child| child.name() == name && child.is_from_bundle())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn root() -> NodeRef {
        Node::new_root(PathBuf::from("/app"), Manifest::named("app"))
    }

    #[test]
    fn parse_tolerates_garbage() {
        assert!(parse(b"{ not json").is_none());
        assert!(parse(b"{}").is_some());
    }

    #[test]
    fn inflates_nested_entries() {
        let snapshot: Shrinkwrap = serde_json::from_str(
            r#"{
                "dependencies": {
                    "a": {
                        "version": "1.0.0",
                        "dependencies": {
                            "b": {"version": "2.1.0"}
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let tree = root();
        inflate(&tree, &snapshot.dependencies).unwrap();

        let a = tree.children().into_iter().find(|c| c.name() == "a").unwrap();
        assert!(a.is_loaded());
        assert_eq!(a.version(), Some(&Version::new(1, 0, 0)));
        let b = a.children().into_iter().find(|c| c.name() == "b").unwrap();
        assert_eq!(b.version(), Some(&Version::new(2, 1, 0)));
        assert_eq!(b.required_by(), [a.flat_name()].into_iter().collect());
    }

    #[test]
    fn reconciles_with_bundled_children() {
        let tree = root();
        let vendored = Node::attach_bundled(
            &tree,
            Manifest::with_version("a", Version::new(1, 0, 0)),
        );
        let snapshot: Shrinkwrap = serde_json::from_str(
            r#"{"dependencies": {"a": {"version": "1.0.0"}}}"#,
        )
        .unwrap();
        inflate(&tree, &snapshot.dependencies).unwrap();

        // No duplicate child; the vendored copy absorbed the entry.
        let named: Vec<_> = tree
            .children()
            .into_iter()
            .filter(|c| c.name() == "a")
            .collect();
        assert_eq!(named.len(), 1);
        assert!(Node::same(&named[0], &vendored));
    }

    #[test]
    fn malformed_entry_is_a_hard_failure_with_ancestry() {
        let snapshot: Shrinkwrap =
            serde_json::from_str(r#"{"dependencies": {"bad": {}}}"#).unwrap();
        let tree = root();
        let err = inflate(&tree, &snapshot.dependencies).unwrap_err();
        match err.root_cause() {
            ResolveError::Shrinkwrap { name, .. } => assert_eq!(name, "bad"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("required by"));
    }
}
