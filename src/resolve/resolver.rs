//! Node resolver: bind a fetched package to an existing node, or allocate
//! and place a new one.

use crate::error::ResolveError;
use crate::fetch::{BundledPackage, FetchedPackage, SnapshotSource};
use crate::resolve::phantom::update_phantom_children;
use crate::resolve::placement::earliest_installable;
use crate::resolve::shrinkwrap;
use crate::spec::RequestedSpec;
use crate::tree::node::{Node, NodeRef};
use tracing::debug;

/// Bind a requirement to an already-installed node.
///
/// Widens the node's requested spec to cover the new request, records the
/// requirer in the node's required-by set, updates shadow entries on the
/// ancestors the edge passes through, and lazily checks for an adjacent
/// frozen-dependency snapshot the first time the node is touched.
pub async fn resolve_with_existing(
    existing: &NodeRef,
    requested: Option<&RequestedSpec>,
    requirer: &NodeRef,
    snapshots: &dyn SnapshotSource,
) -> Result<NodeRef, ResolveError> {
    if existing.requested().is_none() {
        let initial = match (requested, existing.version()) {
            (Some(req), Some(version)) if req.satisfied_by(version) => req.clone(),
            (_, Some(version)) => RequestedSpec::exact(version),
            (_, None) => RequestedSpec::parse("*"),
        };
        existing.set_requested(initial);
    }
    if let Some(req) = requested {
        let mut widened = existing.requested().expect("requested just initialized");
        widened.widen(req);
        existing.set_requested(widened);
    }

    if requirer.manifest().declares_dep(existing.name()) {
        existing.add_required_by(requirer.flat_name());
    }
    requirer.add_require(existing);

    if let (Some(requirer_parent), Some(existing_parent)) = (requirer.parent(), existing.parent())
    {
        if !Node::same(&existing_parent, requirer) {
            update_phantom_children(&requirer_parent, existing);
        }
    }

    if !existing.is_loaded() && !existing.snapshot_checked() {
        let bytes = snapshots.read(existing.install_path()).await;
        existing.set_snapshot_checked();
        if let Some(bytes) = bytes {
            if let Some(snapshot) = shrinkwrap::parse(&bytes) {
                if !snapshot.dependencies.is_empty() {
                    shrinkwrap::inflate(existing, &snapshot.dependencies)?;
                }
            }
        }
    }

    Ok(existing.clone())
}

/// Allocate a node for a freshly fetched package and attach it at the
/// highest legal placement, defaulting to the requirer itself.
pub fn resolve_new(fetched: FetchedPackage, requirer: &NodeRef) -> Result<NodeRef, ResolveError> {
    let placement = earliest_installable(requirer, requirer, &fetched.manifest)
        .unwrap_or_else(|| requirer.clone());
    debug!(
        package = fetched.manifest.name.as_str(),
        at = %placement.id_string(),
        "placing new node"
    );

    let name = fetched.manifest.name.clone();
    let child = Node::attach_under(&placement, fetched.manifest, Some(fetched.requested));
    // The fetcher already told us whether a snapshot ships with the package.
    child.set_snapshot_checked();

    if requirer.manifest().declares_dep(&name) {
        child.add_required_by(requirer.flat_name());
    }
    requirer.add_require(&child);

    if let Some(requirer_parent) = requirer.parent() {
        if !Node::same(&placement, requirer) {
            update_phantom_children(&requirer_parent, &child);
        }
    }

    if let Some(bundled) = fetched.bundled {
        attach_bundle(&child, &bundled);
    }

    if let Some(snapshot) = fetched.shrinkwrap {
        if !snapshot.dependencies.is_empty() {
            shrinkwrap::inflate(&child, &snapshot.dependencies)?;
        }
    }

    Ok(child)
}

/// Attach a pre-vendored subtree verbatim. Members are trusted as shipped;
/// their declared ranges are not revalidated.
fn attach_bundle(parent: &NodeRef, members: &[BundledPackage]) {
    for member in members {
        let node = Node::attach_bundled(parent, member.manifest.clone());
        attach_bundle(&node, &member.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NoSnapshots;
    use crate::manifest::Manifest;
    use semver::Version;
    use std::path::{Path, PathBuf};

    fn manifest(name: &str, version: &str) -> Manifest {
        Manifest::with_version(name, Version::parse(version).unwrap())
    }

    fn fetched(name: &str, version: &str, range: &str) -> FetchedPackage {
        FetchedPackage::new(manifest(name, version), RequestedSpec::parse(range))
    }

    #[test]
    fn resolve_new_hoists_to_the_root() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let a = Node::attach_under(&root, manifest("a", "1.0.0"), None);
        let x = resolve_new(fetched("x", "1.4.0", "^1.0.0"), &a).unwrap();

        assert!(Node::same(&x.parent().unwrap(), &root));
        assert_eq!(x.install_path(), Path::new("/app/node_modules/x"));
        assert_eq!(a.requires().len(), 1);
        // x landed directly under a's parent, so no level is skipped and no
        // shadow entry is recorded.
        assert!(!root.shadow_contains("x"));
    }

    #[test]
    fn resolve_new_records_shadows_when_placement_skips_levels() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let a = Node::attach_under(&root, manifest("a", "1.0.0"), None);
        let b = Node::attach_under(&a, manifest("b", "1.0.0"), None);
        let x = resolve_new(fetched("x", "1.4.0", "^1.0.0"), &b).unwrap();

        assert!(Node::same(&x.parent().unwrap(), &root));
        // The walk starts at the requirer's parent, so b itself carries no
        // entry but the level between it and the placement does.
        assert!(a.shadow_contains("x"));
        assert!(!b.shadow_contains("x"));
        assert!(!root.shadow_contains("x"));
    }

    #[test]
    fn resolve_new_attaches_bundled_subtrees_verbatim() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let mut pkg = fetched("vendored", "1.0.0", "^1.0.0");
        pkg.bundled = Some(vec![BundledPackage {
            manifest: manifest("inner", "0.3.0"),
            children: vec![BundledPackage {
                manifest: manifest("leaf", "0.1.0"),
                children: vec![],
            }],
        }]);
        let node = resolve_new(pkg, &root).unwrap();

        let inner = node.children().into_iter().next().unwrap();
        assert!(inner.is_from_bundle());
        assert_eq!(
            inner.install_path(),
            Path::new("/app/node_modules/vendored/inner")
        );
        let leaf = inner.children().into_iter().next().unwrap();
        assert!(leaf.is_from_bundle());
        assert_eq!(
            leaf.install_path(),
            Path::new("/app/node_modules/vendored/inner/leaf")
        );
    }

    #[tokio::test]
    async fn resolve_existing_widens_and_tracks_requirers() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let x = Node::attach_under(
            &root,
            manifest("x", "1.2.0"),
            Some(RequestedSpec::parse("^1.0.0")),
        );
        let a = Node::attach_under(
            &root,
            {
                let mut m = manifest("a", "1.0.0");
                m.dependencies.insert("x".to_string(), "^1.2.0".to_string());
                m
            },
            None,
        );

        let requested = RequestedSpec::parse("^1.2.0");
        let bound = resolve_with_existing(&x, Some(&requested), &a, &NoSnapshots)
            .await
            .unwrap();

        assert!(Node::same(&bound, &x));
        assert_eq!(x.requested().unwrap().raw, "^1.0.0 ^1.2.0");
        assert!(x.required_by().contains("/a"));
        assert_eq!(a.requires().len(), 1);
    }

    #[tokio::test]
    async fn resolve_existing_without_request_pins_installed_version() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let x = Node::attach_under(&root, manifest("x", "1.2.0"), None);
        resolve_with_existing(&x, None, &root, &NoSnapshots)
            .await
            .unwrap();
        let requested = x.requested().unwrap();
        assert_eq!(requested.raw, "1.2.0");
        assert!(x.snapshot_checked());
    }
}
