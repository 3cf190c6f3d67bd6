//! Tree node: one package occupying (or about to occupy) a directory slot.
//!
//! Ownership is strictly downward: a parent's `children` vector holds the
//! only strong references to its children, and each child keeps a `Weak`
//! back-reference for upward walks. `requires` edges are also weak because
//! mutually dependent siblings would otherwise form reference cycles.
//!
//! Identity is pointer identity: two `NodeRef`s refer to the same tree slot
//! iff `Node::same` says so.

use crate::manifest::Manifest;
use crate::spec::RequestedSpec;
use parking_lot::RwLock;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Synthetic required-by marker: requested directly by the end user.
pub const USER_MARKER: &str = "#USER";

/// Synthetic required-by marker: pre-existing node of unknown provenance.
pub const EXISTING_MARKER: &str = "#EXISTING";

/// Shared handle to a tree node.
pub type NodeRef = Arc<Node>;

/// Mutable per-node bookkeeping, guarded by the node's lock.
#[derive(Debug, Default)]
struct NodeState {
    requested: Option<RequestedSpec>,
    children: Vec<NodeRef>,
    required_by: BTreeSet<String>,
    requires: Vec<Weak<Node>>,
    /// name -> version of packages resolved "through" this node by a
    /// descendant; such a name must never be placed here again.
    shadowed_names: BTreeMap<String, Version>,
    loaded: bool,
    directly_requested: bool,
    dev_dependency: bool,
    from_bundle: bool,
    global: bool,
    save: bool,
    /// Whether an adjacent frozen-dependency snapshot has been looked for.
    snapshot_checked: bool,
}

/// One resolved-or-pending package in the installation tree.
#[derive(Debug)]
pub struct Node {
    name: String,
    version: Option<Version>,
    manifest: Manifest,
    parent: Weak<Node>,
    install_path: PathBuf,
    real_path: PathBuf,
    state: RwLock<NodeState>,
}

impl Node {
    /// Create a detached root node for the directory being installed into.
    pub fn new_root(path: PathBuf, manifest: Manifest) -> NodeRef {
        Arc::new(Node {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            real_path: path.clone(),
            install_path: path,
            manifest,
            parent: Weak::new(),
            state: RwLock::new(NodeState::default()),
        })
    }

    /// Attach a new child under `parent` at the regular
    /// `<parent>/node_modules/<name>` slot. The paths are fixed for the
    /// lifetime of the attach.
    pub fn attach_under(
        parent: &NodeRef,
        manifest: Manifest,
        requested: Option<RequestedSpec>,
    ) -> NodeRef {
        let install_path = parent
            .install_path
            .join("node_modules")
            .join(&manifest.name);
        let real_path = parent.real_path.join("node_modules").join(&manifest.name);
        Self::attach_at(parent, manifest, requested, install_path, real_path, false)
    }

    /// Attach a pre-vendored (bundled) child. Bundled members live directly
    /// under their parent's directory, not under a `node_modules` level.
    pub fn attach_bundled(parent: &NodeRef, manifest: Manifest) -> NodeRef {
        let install_path = parent.install_path.join(&manifest.name);
        let real_path = parent.real_path.join(&manifest.name);
        Self::attach_at(parent, manifest, None, install_path, real_path, true)
    }

    fn attach_at(
        parent: &NodeRef,
        manifest: Manifest,
        requested: Option<RequestedSpec>,
        install_path: PathBuf,
        real_path: PathBuf,
        from_bundle: bool,
    ) -> NodeRef {
        let node = Arc::new(Node {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            manifest,
            parent: Arc::downgrade(parent),
            install_path,
            real_path,
            state: RwLock::new(NodeState {
                requested,
                from_bundle,
                ..NodeState::default()
            }),
        });
        parent.state.write().children.push(node.clone());
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    /// Pointer identity: same tree slot, not same package.
    pub fn same(a: &NodeRef, b: &NodeRef) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// `name@version` when the version is known, bare name otherwise.
    pub fn id_string(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{}", self.name, version),
            None => self.name.clone(),
        }
    }

    /// Flattened tree position, `/` for the root and `/a/b` for the node
    /// `b` installed under `a`. Used as the opaque required-by key.
    pub fn flat_name(&self) -> String {
        match self.parent.upgrade() {
            None => "/".to_string(),
            Some(parent) => {
                let prefix = parent.flat_name();
                if prefix == "/" {
                    format!("/{}", self.name)
                } else {
                    format!("{}/{}", prefix, self.name)
                }
            }
        }
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.state.read().children.clone()
    }

    /// Remove and return every direct child with the given name.
    pub fn remove_children_named(&self, name: &str) -> Vec<NodeRef> {
        let mut state = self.state.write();
        let (removed, kept) = state
            .children
            .drain(..)
            .partition(|child| child.name() == name);
        state.children = kept;
        removed
    }

    pub fn requested(&self) -> Option<RequestedSpec> {
        self.state.read().requested.clone()
    }

    pub fn set_requested(&self, requested: RequestedSpec) {
        self.state.write().requested = Some(requested);
    }

    pub fn required_by(&self) -> BTreeSet<String> {
        self.state.read().required_by.clone()
    }

    pub fn add_required_by(&self, position: impl Into<String>) {
        self.state.write().required_by.insert(position.into());
    }

    pub fn set_required_by(&self, positions: BTreeSet<String>) {
        self.state.write().required_by = positions;
    }

    /// Record an outgoing requires edge, once per target node.
    pub fn add_require(&self, child: &NodeRef) {
        let mut state = self.state.write();
        let already = state
            .requires
            .iter()
            .any(|weak| weak.upgrade().map_or(false, |node| Node::same(&node, child)));
        if !already {
            state.requires.push(Arc::downgrade(child));
        }
    }

    /// Live targets of this node's requires edges.
    pub fn requires(&self) -> Vec<NodeRef> {
        self.state
            .read()
            .requires
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn clear_requires(&self) {
        self.state.write().requires.clear();
    }

    pub fn shadow_insert(&self, name: impl Into<String>, version: Version) {
        self.state.write().shadowed_names.insert(name.into(), version);
    }

    pub fn shadow_contains(&self, name: &str) -> bool {
        self.state.read().shadowed_names.contains_key(name)
    }

    pub fn shadowed_names(&self) -> BTreeMap<String, Version> {
        self.state.read().shadowed_names.clone()
    }

    pub fn clear_shadowed_names(&self) {
        self.state.write().shadowed_names.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    pub fn set_loaded(&self) {
        self.state.write().loaded = true;
    }

    pub fn is_directly_requested(&self) -> bool {
        self.state.read().directly_requested
    }

    pub fn mark_directly_requested(&self) {
        self.state.write().directly_requested = true;
    }

    pub fn is_dev_dependency(&self) -> bool {
        self.state.read().dev_dependency
    }

    pub fn mark_dev_dependency(&self) {
        self.state.write().dev_dependency = true;
    }

    pub fn is_from_bundle(&self) -> bool {
        self.state.read().from_bundle
    }

    pub fn is_global(&self) -> bool {
        self.state.read().global
    }

    pub fn set_global(&self) {
        self.state.write().global = true;
    }

    pub fn save_to_dependencies(&self) -> bool {
        self.state.read().save
    }

    pub fn set_save_to_dependencies(&self, save: bool) {
        self.state.write().save = save;
    }

    pub fn snapshot_checked(&self) -> bool {
        self.state.read().snapshot_checked
    }

    pub fn set_snapshot_checked(&self) {
        self.state.write().snapshot_checked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str, version: &str) -> Manifest {
        Manifest::with_version(name, Version::parse(version).unwrap())
    }

    #[test]
    fn attach_under_nests_through_node_modules() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let child = Node::attach_under(&root, manifest("x", "1.0.0"), None);
        assert_eq!(child.install_path(), Path::new("/app/node_modules/x"));
        assert!(Node::same(&child.parent().unwrap(), &root));
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn attach_bundled_nests_directly_under_parent() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let vendored = Node::attach_bundled(&root, manifest("v", "2.0.0"));
        assert_eq!(vendored.install_path(), Path::new("/app/v"));
        assert!(vendored.is_from_bundle());
    }

    #[test]
    fn flat_name_walks_to_the_root() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let a = Node::attach_under(&root, manifest("a", "1.0.0"), None);
        let b = Node::attach_under(&a, manifest("b", "1.0.0"), None);
        assert_eq!(root.flat_name(), "/");
        assert_eq!(a.flat_name(), "/a");
        assert_eq!(b.flat_name(), "/a/b");
    }

    #[test]
    fn requires_edges_are_deduplicated_and_weak() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let child = Node::attach_under(&root, manifest("x", "1.0.0"), None);
        root.add_require(&child);
        root.add_require(&child);
        assert_eq!(root.requires().len(), 1);

        root.remove_children_named("x");
        drop(child);
        assert!(root.requires().is_empty());
    }

    #[test]
    fn remove_children_named_detaches_only_matches() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        Node::attach_under(&root, manifest("x", "1.0.0"), None);
        Node::attach_under(&root, manifest("y", "1.0.0"), None);
        let removed = root.remove_children_named("x");
        assert_eq!(removed.len(), 1);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].name(), "y");
    }
}
