//! Graph primitives shared by the atlaspack bundling pipeline.
//!
//! These types carry no bundling semantics. [`DirectedGraph`] is an arena of payloads addressed by
//! [`NodeId`], [`find_strongly_connected_components`] condenses it and [`simple_fast`] computes
//! immediate dominators over the (acyclic) result.

mod directed_graph;
mod dominators;
mod error;
mod scc;

pub use self::directed_graph::*;
pub use self::dominators::*;
pub use self::error::*;
pub use self::scc::*;
