//! Package manifest model.
//!
//! The manifest carries the four dependency maps, executable-binary entries,
//! and the package identity. Maps are `BTreeMap` so every iteration order is
//! name-sorted; deterministic tree shape depends on it.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The `bin` field: either a single path (exposed under the package's own
/// name) or an explicit name-to-path map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinEntries {
    Path(String),
    Map(BTreeMap<String, String>),
}

/// A package's declared metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    pub name: String,
    pub version: Option<Version>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
    pub bin: Option<BinEntries>,
}

impl Manifest {
    /// A minimal manifest with only a name. Mostly useful for roots and
    /// tests.
    pub fn named(name: impl Into<String>) -> Self {
        Manifest {
            name: name.into(),
            ..Manifest::default()
        }
    }

    pub fn with_version(name: impl Into<String>, version: Version) -> Self {
        Manifest {
            name: name.into(),
            version: Some(version),
            ..Manifest::default()
        }
    }

    /// The dependencies resolved at install time: `dependencies` merged with
    /// `optionalDependencies`, the latter winning on conflict. npm manifests
    /// normalize optionals into the regular map the same way.
    pub fn runtime_deps(&self) -> BTreeMap<String, String> {
        let mut merged = self.dependencies.clone();
        for (name, range) in &self.optional_dependencies {
            merged.insert(name.clone(), range.clone());
        }
        merged
    }

    /// Whether a failure to resolve `name` should degrade to a warning.
    pub fn is_optional_dep(&self, name: &str) -> bool {
        self.optional_dependencies.contains_key(name)
    }

    /// Whether this manifest declares `name` as a real dependency (regular,
    /// optional, or dev).
    pub fn declares_dep(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
            || self.optional_dependencies.contains_key(name)
            || self.dev_dependencies.contains_key(name)
    }

    /// Executable names this package exposes.
    pub fn bin_names(&self) -> BTreeSet<String> {
        match &self.bin {
            None => BTreeSet::new(),
            Some(BinEntries::Path(_)) => {
                let mut set = BTreeSet::new();
                set.insert(self.name.clone());
                set
            }
            Some(BinEntries::Map(map)) => map.keys().cloned().collect(),
        }
    }

    /// Whether any executable name collides with one of `other`'s.
    pub fn bins_collide_with(&self, other: &Manifest) -> bool {
        let mine = self.bin_names();
        if mine.is_empty() {
            return false;
        }
        other.bin_names().iter().any(|name| mine.contains(name))
    }
}
