use atlaspack_graph::{NodeId, TraversalAction};

use crate::asset_graph::{AssetGraph, AssetGraphNode};
use crate::types::{FileType, Target};

/// Handle to a bundle created through [`MutableBundleGraph::create_bundle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleId(pub usize);

/// Handle to a bundle group created through [`MutableBundleGraph::create_bundle_group`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleGroupId(pub usize);

/// Why a bundle exists. Drives naming and splittability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BundleRole {
  Entry,
  Async,
  Parallel,
  Shared,
}

impl BundleRole {
  pub fn name_prefix(&self) -> &'static str {
    match self {
      BundleRole::Async => "async.",
      BundleRole::Shared => "shared.",
      BundleRole::Entry | BundleRole::Parallel => "",
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateBundleOptions {
  /// Asset node the bundle starts from. Shared bundles have none and must set `unique_key`.
  pub entry_asset: Option<NodeId>,
  pub unique_key: Option<String>,
  pub target: Target,
  pub bundle_type: FileType,
  pub needs_stable_name: bool,
  pub role: BundleRole,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraverseOptions {
  pub skip_unused_dependencies: bool,
}

/// The operations a bundler needs from the host bundle graph.
///
/// Node ids are the ids of the host [`AssetGraph`]; bundles and bundle groups are referred to by
/// the handles the graph hands out.
pub trait MutableBundleGraph {
  fn asset_graph(&self) -> &AssetGraph;

  fn create_bundle(&mut self, options: CreateBundleOptions) -> anyhow::Result<BundleId>;

  fn add_asset_to_bundle(&mut self, asset: NodeId, bundle: BundleId) -> anyhow::Result<()>;

  /// Marks a lazy dependency as satisfied by the bundle that already contains its target.
  fn internalize_async_dependency(
    &mut self,
    bundle: BundleId,
    dependency: NodeId,
  ) -> anyhow::Result<()>;

  fn create_bundle_group(
    &mut self,
    dependency: NodeId,
    target: &Target,
  ) -> anyhow::Result<BundleGroupId>;

  fn add_bundle_to_bundle_group(
    &mut self,
    bundle: BundleId,
    bundle_group: BundleGroupId,
  ) -> anyhow::Result<()>;

  fn traverse(
    &self,
    start: NodeId,
    options: TraverseOptions,
    visitor: &mut dyn FnMut(NodeId, &AssetGraphNode) -> TraversalAction,
  ) -> anyhow::Result<()> {
    self
      .asset_graph()
      .traverse(start, options.skip_unused_dependencies, visitor)?;
    Ok(())
  }
}
