//! Hoist: Deduplicating Dependency Tree Resolution
//!
//! Resolves a package manifest's declared dependencies into a concrete,
//! deduplicated installation tree: for every required name+range it decides
//! which existing installed node (if any) already satisfies it, and if none
//! does, the highest ancestor directory at which a freshly fetched copy can
//! live without breaking any sibling's expectations.
//!
//! Fetching metadata, unpacking tarballs, and CLI concerns live outside this
//! crate; they plug in through the traits in [`fetch`].

pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod manifest;
pub mod resolve;
pub mod spec;
pub mod tree;

pub use error::ResolveError;
pub use fetch::{FetchedPackage, MetadataFetcher, SnapshotSource};
pub use manifest::Manifest;
pub use resolve::loader::Resolver;
pub use spec::{DependencySpec, RequestedSpec, SpecKind};
pub use tree::node::{Node, NodeRef};
