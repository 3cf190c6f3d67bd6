//! Requirement matcher: is this requirement already met at or above a tree
//! position?

use crate::spec::RequestedSpec;
use crate::tree::node::{Node, NodeRef};

/// Search upward from `from` for an installed node that already satisfies
/// `requested` for `name`.
///
/// A same-named node with a conflicting version blocks the search instead of
/// letting it continue upward: a conflicting sibling at this level always
/// forces a fresh install, never a reuse from further up. Callers depend on
/// the redundant installs this can produce, so the stop-early behavior is
/// deliberate.
pub fn find_requirement(from: &NodeRef, name: &str, requested: &RequestedSpec) -> Option<NodeRef> {
    // The root never matches by name; it occupies no install slot.
    if from.name() == name && !from.is_root() {
        return if version_match(from, requested) {
            Some(from.clone())
        } else {
            None
        };
    }

    let named: Vec<NodeRef> = from
        .children()
        .into_iter()
        .filter(|child| child.name() == name)
        .collect();
    if !named.is_empty() {
        // The name exists here; either one of these copies satisfies the
        // request or a new copy must be installed above here.
        return named
            .into_iter()
            .find(|child| version_match(child, requested));
    }

    match from.parent() {
        Some(parent) => find_requirement(&parent, name, requested),
        None => None,
    }
}

fn version_match(node: &NodeRef, requested: &RequestedSpec) -> bool {
    if let Some(installed) = node.requested() {
        if installed.kind == requested.kind && installed.raw == requested.raw {
            return true;
        }
    }
    match node.version() {
        Some(version) => requested.satisfied_by(version),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::spec::RequestedSpec;
    use proptest::prelude::*;
    use semver::Version;
    use std::path::PathBuf;

    fn root() -> NodeRef {
        Node::new_root(PathBuf::from("/app"), Manifest::named("app"))
    }

    fn child(parent: &NodeRef, name: &str, version: &str) -> NodeRef {
        Node::attach_under(
            parent,
            Manifest::with_version(name, Version::parse(version).unwrap()),
            Some(RequestedSpec::parse(&format!("^{version}"))),
        )
    }

    #[test]
    fn finds_satisfying_child() {
        let tree = root();
        let x = child(&tree, "x", "1.2.0");
        let found = find_requirement(&tree, "x", &RequestedSpec::parse("^1.0.0")).unwrap();
        assert!(Node::same(&found, &x));
    }

    #[test]
    fn searches_upward_when_name_absent_here() {
        let tree = root();
        let x = child(&tree, "x", "1.2.0");
        let a = child(&tree, "a", "1.0.0");
        let b = child(&a, "b", "1.0.0");
        let found = find_requirement(&b, "x", &RequestedSpec::parse("^1.0.0")).unwrap();
        assert!(Node::same(&found, &x));
    }

    #[test]
    fn conflicting_same_named_child_stops_the_search() {
        let tree = root();
        child(&tree, "x", "2.0.0");
        let a = child(&tree, "a", "1.0.0");
        // `a` has its own conflicting copy of x; the satisfying copy at the
        // root must NOT be reached from below it.
        child(&a, "x", "1.0.0");
        let miss = find_requirement(&a, "x", &RequestedSpec::parse("^2.0.0"));
        assert!(miss.is_none());
    }

    #[test]
    fn same_named_node_itself_matches_only_on_version() {
        let tree = root();
        let x = child(&tree, "x", "1.2.0");
        let hit = find_requirement(&x, "x", &RequestedSpec::parse("^1.0.0")).unwrap();
        assert!(Node::same(&hit, &x));
        assert!(find_requirement(&x, "x", &RequestedSpec::parse("^2.0.0")).is_none());
    }

    #[test]
    fn root_never_matches_by_its_own_name() {
        let tree = Node::new_root(
            PathBuf::from("/app"),
            Manifest::with_version("x", Version::new(1, 0, 0)),
        );
        assert!(find_requirement(&tree, "x", &RequestedSpec::parse("^1.0.0")).is_none());
    }

    #[test]
    fn exact_requested_spec_match_short_circuits_version_check() {
        let tree = root();
        let x = Node::attach_under(
            &tree,
            Manifest::with_version("x", Version::new(1, 0, 0)),
            Some(RequestedSpec::parse("^1.0.0")),
        );
        // Identical kind+literal matches even though we don't consult the
        // installed version at all.
        let found = find_requirement(&tree, "x", &RequestedSpec::parse("^1.0.0")).unwrap();
        assert!(Node::same(&found, &x));
    }

    proptest! {
        /// Whatever the tree holds, a hit always carries the requested name
        /// and a satisfying version.
        #[test]
        fn hits_always_satisfy(
            versions in proptest::collection::vec((0u64..4, 0u64..6, 0u64..6), 0..6),
            wanted_major in 0u64..4,
        ) {
            let tree = root();
            for (major, minor, patch) in &versions {
                let name = format!("pkg{major}");
                Node::attach_under(
                    &tree,
                    Manifest::with_version(&name, Version::new(*major, *minor, *patch)),
                    None,
                );
            }
            let requested = RequestedSpec::parse(&format!("^{wanted_major}.0.0"));
            let name = format!("pkg{wanted_major}");
            if let Some(found) = find_requirement(&tree, &name, &requested) {
                prop_assert_eq!(found.name(), name.as_str());
                prop_assert!(requested.satisfied_by(found.version().unwrap()));
            }
        }
    }
}
