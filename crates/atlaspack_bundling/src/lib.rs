//! Dominator based bundling.
//!
//! The asset graph is condensed into strongly connected components, which are organised into a
//! dominator tree rooted at a synthetic super-root. Entries, lazy imports, parallel imports and
//! components reached from more than one of those start a package; every other component joins
//! the package of its immediate dominator. Each package then becomes one bundle in the host
//! bundle graph.
//!
//! The phases are exposed on their own ([`find_asset_dominators`], [`create_packages`],
//! [`into_bundle_graph`]) and chained by [`DominatorBundler`].

use atlaspack_core::asset_graph::AssetGraph;
use atlaspack_core::bundle_graph::MutableBundleGraph;
use tracing::{info, instrument};

pub mod dominator_tree;
pub mod error;
pub mod materialize;
pub mod options;
pub mod packages;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use dominator_tree::{find_asset_dominators, AssetDominators};
pub use error::{BundlingError, BundlingPhase};
pub use materialize::into_bundle_graph;
pub use options::DominatorBundlerOptions;
pub use packages::{create_packages, Package, PackageKind, PackagedDominatorGraph};
pub use types::{BundlingStats, Decision, DecisionKind, DecisionLog};

/// Bundler algorithms assign the assets of the host graph to bundles.
///
/// Implementations mutate the provided bundle graph: they create bundles and bundle groups, and
/// record which assets each bundle contains.
pub trait Bundler {
  fn bundle(&self, bundle_graph: &mut dyn MutableBundleGraph) -> anyhow::Result<()>;
}

/// Runs the dominator bundling pipeline. Holds no state besides its options, so one instance can
/// serve concurrent builds.
#[derive(Clone, Debug, Default)]
pub struct DominatorBundler {
  pub options: DominatorBundlerOptions,
}

impl DominatorBundler {
  pub fn new(options: DominatorBundlerOptions) -> Self {
    Self { options }
  }

  /// Builds the packages without touching a bundle graph.
  pub fn build_packages(
    &self,
    asset_graph: &AssetGraph,
  ) -> Result<PackagedDominatorGraph, BundlingError> {
    let dominators = find_asset_dominators(asset_graph, &self.options)?;
    create_packages(asset_graph, &dominators, &self.options)
  }

  #[instrument(level = "debug", skip_all)]
  pub fn run(
    &self,
    bundle_graph: &mut dyn MutableBundleGraph,
  ) -> Result<BundlingStats, BundlingError> {
    let packages = self.build_packages(bundle_graph.asset_graph())?;
    let stats = into_bundle_graph(&packages, bundle_graph, &self.options)?;

    info!(
      assets = stats.assets,
      components = stats.components,
      packages = stats.packages,
      bundles = stats.bundles,
      bundle_groups = stats.bundle_groups,
      "Bundled asset graph"
    );

    Ok(stats)
  }
}

impl Bundler for DominatorBundler {
  fn bundle(&self, bundle_graph: &mut dyn MutableBundleGraph) -> anyhow::Result<()> {
    self.run(bundle_graph)?;
    Ok(())
  }
}
