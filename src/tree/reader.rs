//! Read an already-installed tree from disk.
//!
//! Builds a [`Node`] tree from a directory's `node_modules` layout so that
//! loaders like `load_extraneous` and `recalculate_metadata` have something
//! to backfill. Nodes read this way carry no requested spec and are not
//! loaded; resolution fills that in.

use crate::error::ReadError;
use crate::manifest::Manifest;
use crate::tree::node::{Node, NodeRef};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Read the package rooted at `dir` and every installed descendant.
pub fn read_tree(dir: &Path) -> Result<NodeRef, ReadError> {
    let manifest = read_manifest(dir)?;
    let root = Node::new_root(dir.to_path_buf(), manifest);
    read_children(&root)?;
    Ok(root)
}

fn read_manifest(dir: &Path) -> Result<Manifest, ReadError> {
    let path = dir.join("package.json");
    let bytes = std::fs::read(&path).map_err(|source| ReadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ReadError::Manifest {
        path: path.display().to_string(),
        source,
    })
}

fn read_children(node: &NodeRef) -> Result<(), ReadError> {
    let modules_dir = node.install_path().join("node_modules");
    if !modules_dir.is_dir() {
        return Ok(());
    }

    // Depth 1 holds plain packages and `@scope` directories; depth 2 holds
    // the packages inside a scope. Sorted traversal keeps sibling order
    // deterministic.
    for entry in WalkDir::new(&modules_dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| ReadError::Io {
            path: modules_dir.display().to_string(),
            source: err.into(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let scoped_parent = entry.depth() == 2
            && entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map_or(false, |parent| {
                    parent.to_string_lossy().starts_with('@')
                });
        let is_package_dir = match entry.depth() {
            1 => !name.starts_with('@'),
            2 => scoped_parent,
            _ => false,
        };
        if !is_package_dir {
            continue;
        }
        let disk_name = if scoped_parent {
            let scope = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map(|scope| scope.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{scope}/{name}")
        } else {
            name.into_owned()
        };

        let manifest = match read_manifest(entry.path()) {
            Ok(manifest) => manifest,
            Err(ReadError::Io { path, .. }) => {
                debug!(path = path.as_str(), "skipping directory without manifest");
                continue;
            }
            Err(err) => return Err(err),
        };
        // Attaching derives the install path from the manifest's name, so a
        // manifest that disagrees with its directory would produce a node
        // pointing at a directory that doesn't exist.
        if manifest.name != disk_name {
            debug!(
                path = %entry.path().display(),
                declared = manifest.name.as_str(),
                "skipping directory whose manifest declares another name"
            );
            continue;
        }
        let child = Node::attach_under(node, manifest, None);
        read_children(&child)?;
    }
    Ok(())
}
