//! Subtree loader: fans out over a node's declared dependencies, resolves
//! each one, and recurses into newly attached children.
//!
//! Metadata fetches for one node's dependencies run concurrently; the
//! read-siblings/decide-placement/attach step runs afterwards, serialized
//! per node, in name-sorted order. Recursion into resolved children is also
//! name-sorted so that tree shape never depends on fetch completion timing.

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::fetch::{FetchedPackage, MetadataFetcher, SnapshotSource};
use crate::resolve::matcher::find_requirement;
use crate::resolve::resolver::{resolve_new, resolve_with_existing};
use crate::spec::{DependencySpec, RequestedSpec};
use crate::tree::node::{Node, NodeRef, USER_MARKER};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A non-fatal advisory produced by [`Resolver::validate_peer_deps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAdvisory {
    /// Identity of the node declaring the peer dependency.
    pub declarer: String,
    pub name: String,
    pub range: String,
}

/// Orchestrates resolution over a dependency tree.
pub struct Resolver {
    fetcher: Arc<dyn MetadataFetcher>,
    snapshots: Arc<dyn SnapshotSource>,
    global: bool,
    production: bool,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn MetadataFetcher>, snapshots: Arc<dyn SnapshotSource>) -> Self {
        Resolver {
            fetcher,
            snapshots,
            global: false,
            production: false,
        }
    }

    pub fn with_config(
        fetcher: Arc<dyn MetadataFetcher>,
        snapshots: Arc<dyn SnapshotSource>,
        config: &ResolverConfig,
    ) -> Self {
        Resolver {
            fetcher,
            snapshots,
            global: config.global,
            production: config.production,
        }
    }

    /// Load the root's regular dependencies, then its development
    /// dependencies unless running in production mode.
    pub async fn load_root(&self, root: &NodeRef) -> Result<(), ResolveError> {
        self.load_deps(root).await?;
        if self.production {
            return Ok(());
        }
        self.load_dev_deps(root).await
    }

    /// Add the given `name@range` literals as top-level dependencies of
    /// `root`, replacing any same-named children, then load the subtrees
    /// underneath them.
    pub async fn load_requested_deps(
        &self,
        literals: &[&str],
        root: &NodeRef,
        save_to_dependencies: bool,
    ) -> Result<(), ResolveError> {
        let mut parsed = Vec::with_capacity(literals.len());
        for literal in literals {
            parsed.push(DependencySpec::parse(literal).map_err(|err| err.required_by(root))?);
        }
        let fetches = parsed.into_iter().map(|spec| async move {
            let result = self.fetcher.fetch(&spec, root.install_path()).await;
            (spec, result)
        });
        let fetched = join_all(fetches).await;

        let mut resolved = Vec::new();
        for (spec, result) in fetched {
            let pkg = result.map_err(|err| fetch_error(&spec, err).required_by(root))?;
            // Replace, never reuse: a direct request always installs fresh.
            root.remove_children_named(&pkg.manifest.name);
            let child = resolve_new(pkg, root).map_err(|err| err.required_by(root))?;
            if self.global {
                child.set_global();
            }
            child.mark_directly_requested();
            child.set_save_to_dependencies(save_to_dependencies);
            // Nodes the user asked for that aren't (and won't become) a real
            // dependency answer to the user alone; the marker keeps pruning
            // from removing them later.
            if !save_to_dependencies && !root.manifest().declares_dep(child.name()) {
                child.add_required_by(USER_MARKER);
            }
            resolved.push(child);
        }

        self.load_each_sorted(root, resolved).await
    }

    /// Detach every direct child of `root` carrying one of the given names.
    pub fn remove_deps(&self, names: &[&str], root: &NodeRef) {
        for name in names {
            let removed = root.remove_children_named(name);
            if !removed.is_empty() {
                debug!(package = *name, count = removed.len(), "removed children");
            }
        }
    }

    /// Load any missing dependencies beneath `node`. Re-entrant calls on an
    /// already-loaded node are no-ops.
    pub async fn load_deps(&self, node: &NodeRef) -> Result<(), ResolveError> {
        self.load_deps_boxed(node.clone()).await
    }

    fn load_deps_boxed(&self, node: NodeRef) -> BoxFuture<'_, Result<(), ResolveError>> {
        async move {
            if node.is_loaded() {
                return Ok(());
            }
            node.set_loaded();

            let deps = node.manifest().runtime_deps();
            let fetches = deps.iter().map(|(name, range)| {
                let spec = DependencySpec::new(name.clone(), range);
                let node = &node;
                async move {
                    let result = self.fetcher.fetch(&spec, node.install_path()).await;
                    (spec, result)
                }
            });
            let fetched = join_all(fetches).await;

            let mut resolved = Vec::new();
            for (spec, result) in fetched {
                match self.bind(&node, &spec, result).await {
                    Ok(child) => resolved.push(child),
                    Err(err) if node.manifest().is_optional_dep(&spec.name) => {
                        warn!(
                            package = spec.name.as_str(),
                            error = %err,
                            "could not install optional dependency"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }

            self.load_each_sorted(&node, resolved).await
        }
        .boxed()
    }

    /// Load development dependencies of `node`. A name also present among
    /// the regular dependencies is treated purely as a regular dependency
    /// and skipped here.
    pub async fn load_dev_deps(&self, node: &NodeRef) -> Result<(), ResolveError> {
        let regular = node.manifest().runtime_deps();
        let dev_only: Vec<(String, String)> = node
            .manifest()
            .dev_dependencies
            .iter()
            .filter(|(name, _)| !regular.contains_key(*name))
            .map(|(name, range)| (name.clone(), range.clone()))
            .collect();

        let fetches = dev_only.iter().map(|(name, range)| {
            let spec = DependencySpec::new(name.clone(), range);
            async move {
                let result = self.fetcher.fetch(&spec, node.install_path()).await;
                (spec, result)
            }
        });
        let fetched = join_all(fetches).await;

        let mut resolved = Vec::new();
        for (spec, result) in fetched {
            let child = self.bind(node, &spec, result).await?;
            child.mark_dev_dependency();
            resolved.push(child);
        }

        self.load_each_sorted(node, resolved).await
    }

    /// Backfill bookkeeping for children that exist in the tree but were
    /// never run through resolution, then load beneath them.
    pub async fn load_extraneous(&self, node: &NodeRef) -> Result<(), ResolveError> {
        let unloaded: Vec<NodeRef> = node
            .children()
            .into_iter()
            .filter(|child| !child.is_loaded())
            .collect();

        let mut resolved = Vec::new();
        for child in unloaded {
            let bound = resolve_with_existing(&child, None, node, self.snapshots.as_ref())
                .await
                .map_err(|err| err.required_by(node))?;
            resolved.push(bound);
        }

        self.load_each_sorted(node, resolved).await
    }

    /// Rebuild required-by, requires, and shadow state from scratch by
    /// re-resolving every declared dependency name against the existing
    /// tree. No fetching happens; names that don't resolve are skipped.
    pub async fn recalculate_metadata(&self, node: &NodeRef) -> Result<(), ResolveError> {
        self.recalculate_boxed(node.clone()).await
    }

    fn recalculate_boxed(&self, node: NodeRef) -> BoxFuture<'_, Result<(), ResolveError>> {
        async move {
            node.clear_requires();
            node.clear_shadowed_names();

            let prior = node.required_by();
            let rebuilt: BTreeSet<String> = if prior.is_empty() {
                if node.is_root() {
                    BTreeSet::new()
                } else {
                    [crate::tree::node::EXISTING_MARKER.to_string()]
                        .into_iter()
                        .collect()
                }
            } else {
                prior
                    .into_iter()
                    .filter(|entry| entry == USER_MARKER)
                    .collect()
            };
            node.set_required_by(rebuilt);

            let mut specs: Vec<DependencySpec> = node
                .manifest()
                .runtime_deps()
                .iter()
                .map(|(name, range)| DependencySpec::new(name.clone(), range))
                .collect();
            if node.is_root() {
                for (name, range) in &node.manifest().dev_dependencies {
                    specs.push(DependencySpec::new(name.clone(), range));
                }
            }

            for spec in specs {
                let Some(found) = find_requirement(&node, &spec.name, &spec.requested) else {
                    continue;
                };
                // Pure re-linking: the node's requested record already covers
                // this range, so no request is passed and nothing widens.
                // Resolution problems here are not load failures.
                let _ =
                    resolve_with_existing(&found, None, &node, self.snapshots.as_ref()).await;
            }

            for child in node.children() {
                self.recalculate_boxed(child).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Check every declared peer dependency against the tree. Absences are
    /// advisories, never failures.
    pub fn validate_peer_deps(&self, node: &NodeRef) -> Vec<PeerAdvisory> {
        let mut advisories = Vec::new();
        self.collect_peer_advisories(node, &mut advisories);
        advisories
    }

    fn collect_peer_advisories(&self, node: &NodeRef, advisories: &mut Vec<PeerAdvisory>) {
        for (name, range) in &node.manifest().peer_dependencies {
            let requested = RequestedSpec::parse(range);
            if find_requirement(node, name, &requested).is_none() {
                warn!(
                    declarer = %node.id_string(),
                    peer = name.as_str(),
                    range = range.as_str(),
                    "requires a peer that is not installed"
                );
                advisories.push(PeerAdvisory {
                    declarer: node.id_string(),
                    name: name.clone(),
                    range: range.clone(),
                });
            }
        }
        for child in node.children() {
            self.collect_peer_advisories(&child, advisories);
        }
    }

    /// Resolve one fetched dependency of `node`: reuse a satisfying
    /// installed node when one exists, place a fresh copy otherwise.
    async fn bind(
        &self,
        node: &NodeRef,
        spec: &DependencySpec,
        result: Result<FetchedPackage, crate::fetch::FetchError>,
    ) -> Result<NodeRef, ResolveError> {
        let pkg = result.map_err(|err| fetch_error(spec, err).required_by(node))?;
        let outcome = match find_requirement(node, &pkg.manifest.name, &spec.requested) {
            Some(existing) => {
                resolve_with_existing(
                    &existing,
                    Some(&pkg.requested),
                    node,
                    self.snapshots.as_ref(),
                )
                .await
            }
            None => resolve_new(pkg, node),
        };
        outcome.map_err(|err| err.required_by(node))
    }

    /// Recurse into freshly resolved children, deduplicated and sorted by
    /// name so placement races can't change the winner between runs. Load
    /// failures below pick up this requirer's identity, building the
    /// required-by chain as they bubble toward the root.
    async fn load_each_sorted(
        &self,
        requirer: &NodeRef,
        mut children: Vec<NodeRef>,
    ) -> Result<(), ResolveError> {
        let mut unique: Vec<NodeRef> = Vec::with_capacity(children.len());
        for child in children.drain(..) {
            if !unique.iter().any(|seen| Node::same(seen, &child)) {
                unique.push(child);
            }
        }
        unique.sort_by(|a, b| a.name().cmp(b.name()));

        for child in unique {
            self.load_deps_boxed(child)
                .await
                .map_err(|err| err.required_by(requirer))?;
        }
        Ok(())
    }
}

fn fetch_error(spec: &DependencySpec, err: crate::fetch::FetchError) -> ResolveError {
    ResolveError::Fetch {
        spec: spec.to_string(),
        reason: err.reason,
    }
}
