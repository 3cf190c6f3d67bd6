//! Shadow tracker: record satisfied-through-here edges on ancestors.

use crate::tree::node::{Node, NodeRef};

/// Walk from `from_ancestor` up toward, but excluding, `placed.parent`,
/// recording `placed.name -> placed.version` in each visited node's shadow
/// map. Invoked whenever deduplication put `placed` somewhere other than
/// directly under its requirer, so later placement decisions at the visited
/// levels cannot silently break this edge.
pub fn update_phantom_children(from_ancestor: &NodeRef, placed: &NodeRef) {
    let placed_parent = placed.parent();
    let mut current = Some(from_ancestor.clone());
    while let Some(node) = current {
        if let Some(parent) = &placed_parent {
            if Node::same(&node, parent) {
                break;
            }
        }
        if let Some(version) = placed.version() {
            node.shadow_insert(placed.name(), version.clone());
        }
        current = node.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use semver::Version;
    use std::path::PathBuf;

    fn manifest(name: &str, version: &str) -> Manifest {
        Manifest::with_version(name, Version::parse(version).unwrap())
    }

    #[test]
    fn marks_every_level_between_requirer_and_placement() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let x = Node::attach_under(&root, manifest("x", "1.2.0"), None);
        let a = Node::attach_under(&root, manifest("a", "1.0.0"), None);
        let b = Node::attach_under(&a, manifest("b", "1.0.0"), None);

        // b's requirement resolved to root's x; mark b's parent chain up to
        // (excluding) root.
        update_phantom_children(&a, &x);

        assert!(a.shadow_contains("x"));
        assert!(!root.shadow_contains("x"));
        assert!(!b.shadow_contains("x"));
        assert_eq!(a.shadowed_names().get("x"), Some(&Version::new(1, 2, 0)));
    }

    #[test]
    fn stops_exactly_below_the_placement_parent() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let a = Node::attach_under(&root, manifest("a", "1.0.0"), None);
        let b = Node::attach_under(&a, manifest("b", "1.0.0"), None);
        let c = Node::attach_under(&b, manifest("c", "1.0.0"), None);
        let x = Node::attach_under(&a, manifest("x", "3.0.0"), None);

        update_phantom_children(&c, &x);

        assert!(c.shadow_contains("x"));
        assert!(b.shadow_contains("x"));
        assert!(!a.shadow_contains("x"));
        assert!(!root.shadow_contains("x"));
    }
}
