//! Installation tree structure.
//!
//! A tree node is one resolved-or-pending package occupying a directory slot.
//! Parents own their children; children keep a weak back-reference for upward
//! walks, so no ownership cycle exists.

pub mod node;
pub mod reader;
