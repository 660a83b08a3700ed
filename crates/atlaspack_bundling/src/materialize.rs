use std::collections::{HashMap, HashSet};

use atlaspack_core::asset_graph::AssetGraphNode;
use atlaspack_core::bundle_graph::{
  BundleId, BundleRole, CreateBundleOptions, MutableBundleGraph, TraverseOptions,
};
use atlaspack_core::types::Target;
use atlaspack_graph::{NodeId, TraversalAction};
use indexmap::IndexSet;
use tracing::{debug, instrument, warn};

use crate::error::{BundlingError, BundlingPhase};
use crate::options::DominatorBundlerOptions;
use crate::packages::{Package, PackageKind, PackagedDominatorGraph};
use crate::types::BundlingStats;

/// Writes one bundle per package into the host bundle graph, followed by the bundle groups that
/// load them.
///
/// Targets are checked for every package before the host graph is touched, so a
/// [`BundlingError::MissingTarget`] leaves the host graph unchanged.
#[instrument(level = "debug", skip_all)]
pub fn into_bundle_graph<B: MutableBundleGraph + ?Sized>(
  packages: &PackagedDominatorGraph,
  bundle_graph: &mut B,
  options: &DominatorBundlerOptions,
) -> Result<BundlingStats, BundlingError> {
  let package_ids = packages.get_package_nodes();

  let mut targets = Vec::with_capacity(package_ids.len());
  for package_id in &package_ids {
    let package = get_package(packages, *package_id)?;
    let target = package.target.clone().ok_or_else(|| {
      let asset = package
        .root_asset()
        .and_then(|asset| bundle_graph.asset_graph().get_asset(asset))
        .map(|asset| asset.id.clone())
        .unwrap_or_default();

      BundlingError::MissingTarget {
        package: *package_id,
        asset,
      }
    })?;
    targets.push(target);
  }

  let mut bundle_by_package = HashMap::with_capacity(package_ids.len());
  let mut internalized_dependencies = 0;

  for (package_id, target) in package_ids.iter().zip(&targets) {
    let package = get_package(packages, *package_id)?;
    let contents = collect_contents(&*bundle_graph, packages, *package_id, package, options)?;

    let create_options = bundle_options(&*bundle_graph, package, target);
    let bundle = bundle_graph.create_bundle(create_options)?;
    for asset in contents.assets {
      bundle_graph.add_asset_to_bundle(asset, bundle)?;
    }
    for dependency in contents.internalized {
      bundle_graph.internalize_async_dependency(bundle, dependency)?;
      internalized_dependencies += 1;
    }

    bundle_by_package.insert(*package_id, bundle);
  }

  let mut bundle_groups = HashSet::new();
  for (package_id, target) in package_ids.iter().zip(&targets) {
    let package = get_package(packages, *package_id)?;
    let loading_dependencies: Vec<NodeId> = match package.kind {
      PackageKind::Entry => package
        .dependencies
        .iter()
        .chain(&package.lazy_dependencies)
        .copied()
        .collect(),
      PackageKind::Async => package
        .dependencies
        .iter()
        .copied()
        .filter(|dependency| {
          bundle_graph
            .asset_graph()
            .get_dependency(*dependency)
            .is_some_and(|dependency| dependency.priority.is_async())
        })
        .collect(),
      PackageKind::Parallel | PackageKind::Shared => continue,
    };

    let bundles = bundles_loaded_with(packages, *package_id, &bundle_by_package);
    for dependency in loading_dependencies {
      let bundle_group = bundle_graph.create_bundle_group(dependency, target)?;
      bundle_groups.insert(bundle_group);

      for bundle in &bundles {
        bundle_graph.add_bundle_to_bundle_group(*bundle, bundle_group)?;
      }
    }
  }

  let asset_graph = bundle_graph.asset_graph();
  let stats = BundlingStats {
    assets: asset_graph.assets().count(),
    dependencies: asset_graph.dependencies().count(),
    components: packages.component_count(),
    cyclic_components: packages.cyclic_component_count(),
    packages: package_ids.len(),
    bundles: bundle_by_package.len(),
    bundle_groups: bundle_groups.len(),
    internalized_dependencies,
  };

  debug!(
    bundles = stats.bundles,
    bundle_groups = stats.bundle_groups,
    internalized_dependencies = stats.internalized_dependencies,
    "Materialized bundle graph"
  );

  Ok(stats)
}

impl From<PackageKind> for BundleRole {
  fn from(kind: PackageKind) -> Self {
    match kind {
      PackageKind::Entry => BundleRole::Entry,
      PackageKind::Async => BundleRole::Async,
      PackageKind::Parallel => BundleRole::Parallel,
      PackageKind::Shared => BundleRole::Shared,
    }
  }
}

fn get_package(
  packages: &PackagedDominatorGraph,
  package_id: NodeId,
) -> Result<&Package, BundlingError> {
  packages
    .get_node(package_id)
    .ok_or(BundlingError::UnknownNode {
      node: package_id,
      phase: BundlingPhase::Materialization,
    })
}

fn bundle_options<B: MutableBundleGraph + ?Sized>(
  bundle_graph: &B,
  package: &Package,
  target: &Target,
) -> CreateBundleOptions {
  let asset_graph = bundle_graph.asset_graph();

  // The asset a loading dependency resolves to, which for a cyclic root is not always the first
  // asset of the component
  let entry_asset = match package.kind {
    PackageKind::Shared => None,
    _ => package
      .dependencies
      .iter()
      .find_map(|dependency| asset_graph.resolve_dependency_asset(*dependency))
      .filter(|asset| package.root_assets.contains(asset))
      .or_else(|| package.root_asset()),
  };

  let unique_key = match package.kind {
    PackageKind::Shared => package
      .root_asset()
      .and_then(|asset| asset_graph.get_asset(asset))
      .map(|asset| format!("shared:{}", asset.id)),
    _ => None,
  };

  let needs_stable_name = package.kind == PackageKind::Entry
    && package.dependencies.iter().any(|dependency| {
      asset_graph
        .get_dependency(*dependency)
        .is_some_and(|dependency| dependency.needs_stable_name)
    });

  CreateBundleOptions {
    entry_asset,
    unique_key,
    target: target.clone(),
    bundle_type: package.bundle_type.clone(),
    needs_stable_name,
    role: BundleRole::from(package.kind),
  }
}

struct PackageContents {
  assets: IndexSet<NodeId>,
  internalized: IndexSet<NodeId>,
}

/// Walks the host graph from the package root without entering assets owned by other packages.
fn collect_contents<B: MutableBundleGraph + ?Sized>(
  bundle_graph: &B,
  packages: &PackagedDominatorGraph,
  package_id: NodeId,
  package: &Package,
  options: &DominatorBundlerOptions,
) -> Result<PackageContents, BundlingError> {
  let asset_graph = bundle_graph.asset_graph();
  let traverse_options = TraverseOptions {
    skip_unused_dependencies: options.skip_unused_dependencies,
  };

  let mut assets = IndexSet::new();
  let mut internalized = IndexSet::new();

  for root in &package.root_assets {
    bundle_graph.traverse(
      *root,
      traverse_options,
      &mut |node_id: NodeId, node: &AssetGraphNode| match node {
        AssetGraphNode::Asset(_) => {
          if packages.package_for_asset(node_id) != Some(package_id) {
            return TraversalAction::SkipChildren;
          }

          if assets.insert(node_id) {
            TraversalAction::Continue
          } else {
            TraversalAction::SkipChildren
          }
        }
        AssetGraphNode::Dependency(dependency_node) => {
          if dependency_node.dependency.priority.is_async() {
            let resolved = asset_graph.resolve_dependency_asset(node_id);
            if resolved.is_some_and(|asset| packages.package_for_asset(asset) == Some(package_id)) {
              internalized.insert(node_id);
            }
          }

          TraversalAction::Continue
        }
        AssetGraphNode::Root => TraversalAction::Continue,
      },
    )?;
  }

  for asset in &package.assets {
    if assets.insert(*asset) {
      warn!(
        package = %package_id,
        asset = %asset,
        "Package asset was not reached from the package root"
      );
    }
  }

  Ok(PackageContents {
    assets,
    internalized,
  })
}

/// Bundles of the package and every package it loads statically or in parallel.
fn bundles_loaded_with(
  packages: &PackagedDominatorGraph,
  package_id: NodeId,
  bundle_by_package: &HashMap<NodeId, BundleId>,
) -> Vec<BundleId> {
  packages
    .load_closure(package_id)
    .into_iter()
    .filter_map(|package| bundle_by_package.get(&package).copied())
    .collect()
}
