//! Error taxonomy for tree resolution.
//!
//! Hard failures bubble to the caller as values, never as panics. Each level
//! of the requirer chain wraps the error with the identity of the node that
//! needed the failing package, so callers can render
//! "required by A required by B ..." trails.

use crate::tree::node::NodeRef;
use thiserror::Error;

/// Errors produced while resolving a dependency tree.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The metadata fetcher collaborator failed to produce a package.
    #[error("failed to fetch '{spec}': {reason}")]
    Fetch { spec: String, reason: String },

    /// A `name@range` literal could not be parsed into a requested spec.
    #[error("invalid dependency specifier '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// A frozen-dependency snapshot entry was internally inconsistent.
    #[error("invalid shrinkwrap entry for '{name}': {reason}")]
    Shrinkwrap { name: String, reason: String },

    /// Context frame: the wrapped error occurred while resolving a
    /// dependency of `via`.
    #[error("{source} (required by {via})")]
    RequiredBy {
        via: String,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// Wrap this error with the identity of the node that required the
    /// failing package.
    pub fn required_by(self, node: &NodeRef) -> Self {
        ResolveError::RequiredBy {
            via: node.id_string(),
            source: Box::new(self),
        }
    }

    /// Strip every requirer-chain frame and return the underlying failure.
    pub fn root_cause(&self) -> &ResolveError {
        match self {
            ResolveError::RequiredBy { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors produced while reading an installed tree from disk.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest at {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::tree::node::Node;
    use std::path::PathBuf;

    #[test]
    fn root_cause_unwraps_requirer_chain() {
        let root = Node::new_root(PathBuf::from("/app"), Manifest::named("app"));
        let err = ResolveError::Fetch {
            spec: "left-pad@^1.0.0".to_string(),
            reason: "registry unreachable".to_string(),
        };
        let wrapped = err.required_by(&root).required_by(&root);
        match wrapped.root_cause() {
            ResolveError::Fetch { spec, .. } => assert_eq!(spec, "left-pad@^1.0.0"),
            other => panic!("unexpected root cause: {other}"),
        }
        let rendered = wrapped.to_string();
        assert!(rendered.contains("required by app"), "{rendered}");
    }
}
