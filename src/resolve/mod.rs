//! The resolution/dedup engine.
//!
//! Leaf-first: [`matcher`] finds an installed node that already satisfies a
//! requirement, [`placement`] picks the highest legal home for a fresh copy,
//! [`phantom`] records satisfied-through-here edges on the ancestors in
//! between, [`resolver`] binds fetched packages to nodes, [`shrinkwrap`]
//! expands frozen snapshots, and [`loader`] orchestrates the fan-out per
//! tree node.

pub mod loader;
pub mod matcher;
pub mod phantom;
pub mod placement;
pub mod resolver;
pub mod shrinkwrap;
