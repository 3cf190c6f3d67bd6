//! Placement planner: the highest ancestor where a fresh copy can live.

use crate::manifest::Manifest;
use crate::tree::node::{Node, NodeRef};
use tracing::debug;

/// Find the highest level of the tree at which `pkg` may be installed,
/// starting the search at `search_from` and walking toward the root.
///
/// Returns `None` when `search_from` itself disqualifies, in which case the
/// caller installs at the requirer. `requirer` is the node whose dependency
/// is being placed; its own manifest declaring the name does not disqualify
/// it (that's the slot being filled).
pub fn earliest_installable(
    requirer: &NodeRef,
    search_from: &NodeRef,
    pkg: &Manifest,
) -> Option<NodeRef> {
    if disqualified(requirer, search_from, pkg) {
        return None;
    }

    if search_from.is_root() || search_from.is_global() {
        return Some(search_from.clone());
    }

    let parent = search_from.parent()?;
    match earliest_installable(requirer, &parent, pkg) {
        Some(higher) => Some(higher),
        None => {
            debug!(
                package = pkg.name.as_str(),
                at = %search_from.id_string(),
                "placement stops below conflicting ancestor"
            );
            Some(search_from.clone())
        }
    }
}

/// Any one of these conditions blocks placement at `node` and above.
fn disqualified(requirer: &NodeRef, node: &NodeRef, pkg: &Manifest) -> bool {
    let children = node.children();

    // A same-named child here would be duplicated by this install.
    if children.iter().any(|child| child.name() == pkg.name) {
        return true;
    }

    // A sibling exposing one of our executable names would be clobbered.
    if children
        .iter()
        .any(|child| child.manifest().bins_collide_with(pkg))
    {
        return true;
    }

    // This level declares its own dependency on the name. Had its copy been
    // compatible the matcher would already have reused it, so it must be a
    // conflicting one.
    if !Node::same(requirer, node) && node.manifest().runtime_deps().contains_key(&pkg.name) {
        return true;
    }

    // A descendant already resolved this name differently through here.
    if node.shadow_contains(&pkg.name) {
        return true;
    }

    false
}
