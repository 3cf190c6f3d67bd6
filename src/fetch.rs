//! Collaborator interfaces: metadata fetching and snapshot reading.
//!
//! The resolution engine never talks to a registry or the filesystem
//! directly. Callers supply a [`MetadataFetcher`] that turns a dependency
//! spec into a package descriptor, and a [`SnapshotSource`] that produces the
//! raw bytes of an adjacent frozen-dependency file, if one exists.

use crate::manifest::Manifest;
use crate::resolve::shrinkwrap::Shrinkwrap;
use crate::spec::{DependencySpec, RequestedSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reported by a metadata fetcher.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct FetchError {
    pub spec: String,
    pub reason: String,
}

impl FetchError {
    pub fn new(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

/// A pre-vendored dependency shipped inside a package's own distribution.
/// Attached verbatim, never re-resolved.
#[derive(Debug, Clone)]
pub struct BundledPackage {
    pub manifest: Manifest,
    pub children: Vec<BundledPackage>,
}

/// Fetched package descriptor: everything resolution needs to know about a
/// package before deciding where it lives.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub manifest: Manifest,
    /// How this package was asked for.
    pub requested: RequestedSpec,
    /// Dependencies vendored inside the distribution, if any.
    pub bundled: Option<Vec<BundledPackage>>,
    /// Frozen-dependency snapshot shipped with the package, if any.
    pub shrinkwrap: Option<Shrinkwrap>,
}

impl FetchedPackage {
    pub fn new(manifest: Manifest, requested: RequestedSpec) -> Self {
        FetchedPackage {
            manifest,
            requested,
            bundled: None,
            shrinkwrap: None,
        }
    }
}

/// Turns a dependency spec into a package descriptor. Registry access,
/// caching, and retries all live behind this trait.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(
        &self,
        spec: &DependencySpec,
        base_dir: &Path,
    ) -> Result<FetchedPackage, FetchError>;
}

/// Produces the raw bytes of a package's adjacent frozen-dependency file.
/// `None` means "absent"; unreadable files are also absent.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn read(&self, package_dir: &Path) -> Option<Vec<u8>>;
}

/// Default snapshot source: reads `npm-shrinkwrap.json` next to the
/// package's manifest.
#[derive(Debug, Default)]
pub struct FsSnapshotSource;

pub const SNAPSHOT_FILE_NAME: &str = "npm-shrinkwrap.json";

#[async_trait]
impl SnapshotSource for FsSnapshotSource {
    async fn read(&self, package_dir: &Path) -> Option<Vec<u8>> {
        let path: PathBuf = package_dir.join(SNAPSHOT_FILE_NAME);
        tokio::fs::read(&path).await.ok()
    }
}

/// Snapshot source that never finds anything. Useful when the caller knows
/// no shrinkwrap files exist, and in tests.
#[derive(Debug, Default)]
pub struct NoSnapshots;

#[async_trait]
impl SnapshotSource for NoSnapshots {
    async fn read(&self, _package_dir: &Path) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_snapshot_source_reads_adjacent_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSnapshotSource;
        assert!(source.read(dir.path()).await.is_none());

        std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"{}").unwrap();
        assert_eq!(source.read(dir.path()).await.unwrap(), b"{}");
    }
}
