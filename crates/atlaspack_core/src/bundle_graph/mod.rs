pub mod mutable_bundle_graph;
pub mod native_bundle_graph;

pub use mutable_bundle_graph::*;
pub use native_bundle_graph::{NativeBundleGraph, NativeBundleGraphEdgeType, NativeBundleGraphNode};
