use std::collections::{HashMap, VecDeque};

use atlaspack_core::asset_graph::AssetGraph;
use atlaspack_core::types::{FileType, Target};
use atlaspack_graph::{DirectedGraph, GraphError, NodeId};
use indexmap::IndexSet;
use tracing::{debug, instrument};

use crate::dominator_tree::{AssetDominators, BoundaryKind, Component};
use crate::error::{BundlingError, BundlingPhase};
use crate::options::DominatorBundlerOptions;
use crate::types::{DecisionKind, DecisionLog};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PackageKind {
  /// Rooted at the asset of an entry dependency
  Entry,
  /// Rooted at an asset loaded through a lazy or conditional import
  Async,
  /// Rooted at an asset loaded alongside its importer
  Parallel,
  /// Rooted at a component that more than one package root reaches
  Shared,
}

/// A set of assets that always load together.
#[derive(Clone, Debug, PartialEq)]
pub struct Package {
  pub kind: PackageKind,
  /// Condensed node the package is rooted at
  pub component: NodeId,
  /// Every condensed node of the package, root first
  pub components: Vec<NodeId>,
  pub root_assets: Vec<NodeId>,
  pub assets: IndexSet<NodeId>,
  /// Host dependencies that load the package: entry dependencies for entry packages, the lazy
  /// or parallel imports otherwise
  pub dependencies: Vec<NodeId>,
  /// Lazy or conditional imports of an entry package, each loads it through its own bundle group
  pub lazy_dependencies: Vec<NodeId>,
  pub lazy_packages: Vec<NodeId>,
  pub parallel_packages: Vec<NodeId>,
  pub target: Option<Target>,
  pub bundle_type: FileType,
}

impl Package {
  pub fn root_asset(&self) -> Option<NodeId> {
    self.root_assets.first().copied()
  }
}

/// Packages derived from the dominator tree.
///
/// Edges are static (synchronous) dependencies between packages. Lazy and parallel relations are
/// kept on the packages themselves.
#[derive(Clone, Debug)]
pub struct PackagedDominatorGraph {
  graph: DirectedGraph<Package>,
  package_by_asset: HashMap<NodeId, NodeId>,
  components: usize,
  cyclic_components: usize,
  pub debug: Option<DecisionLog>,
}

impl PackagedDominatorGraph {
  pub fn graph(&self) -> &DirectedGraph<Package> {
    &self.graph
  }

  /// Package ids in creation order.
  pub fn get_package_nodes(&self) -> Vec<NodeId> {
    self.graph.node_ids().collect()
  }

  pub fn get_node(&self, package: NodeId) -> Option<&Package> {
    self.graph.get_node(package).ok()
  }

  pub fn package_for_asset(&self, asset: NodeId) -> Option<NodeId> {
    self.package_by_asset.get(&asset).copied()
  }

  pub fn static_dependencies(&self, package: NodeId) -> &[NodeId] {
    self.graph.outgoing_neighbors(package).unwrap_or(&[])
  }

  pub fn component_count(&self) -> usize {
    self.components
  }

  pub fn cyclic_component_count(&self) -> usize {
    self.cyclic_components
  }

  /// The package followed by every package it loads statically or in parallel, transitively, in
  /// discovery order.
  pub fn load_closure(&self, package: NodeId) -> Vec<NodeId> {
    let mut closure = IndexSet::new();
    closure.insert(package);

    let mut next_index = 0;
    while let Some(current) = closure.get_index(next_index).copied() {
      next_index += 1;

      let Some(current_package) = self.get_node(current) else {
        continue;
      };

      for next in self
        .static_dependencies(current)
        .iter()
        .chain(&current_package.parallel_packages)
      {
        closure.insert(*next);
      }
    }

    closure.into_iter().collect()
  }
}

/// Derives packages from the dominator tree.
///
/// Package roots are created in a fixed order: entry components in entry order, then in reverse
/// postorder the components loaded lazily, in parallel, or shared between package roots. Every
/// other reachable component joins the package of its immediate dominator.
#[instrument(level = "debug", skip_all)]
pub fn create_packages(
  asset_graph: &AssetGraph,
  dominators: &AssetDominators,
  options: &DominatorBundlerOptions,
) -> Result<PackagedDominatorGraph, BundlingError> {
  let mut builder = PackageBuilder {
    asset_graph,
    dominators,
    graph: DirectedGraph::new(),
    package_by_component: HashMap::new(),
    package_by_asset: HashMap::new(),
    decisions: options.collect_debug.then(DecisionLog::default),
  };

  builder.create_roots()?;
  builder.assign_components()?;
  builder.connect_packages()?;
  builder.resolve_targets()?;

  let mut components = 0;
  let mut cyclic_components = 0;
  for (_, component) in dominators.components() {
    components += 1;
    if component.is_cyclic() {
      cyclic_components += 1;
    }
  }

  debug!(
    packages = builder.graph.node_count(),
    components,
    cyclic_components,
    "Created packages"
  );

  Ok(PackagedDominatorGraph {
    graph: builder.graph,
    package_by_asset: builder.package_by_asset,
    components,
    cyclic_components,
    debug: builder.decisions,
  })
}

struct PackageBuilder<'a> {
  asset_graph: &'a AssetGraph,
  dominators: &'a AssetDominators,
  graph: DirectedGraph<Package>,
  package_by_component: HashMap<NodeId, NodeId>,
  package_by_asset: HashMap<NodeId, NodeId>,
  decisions: Option<DecisionLog>,
}

fn packaging(error: GraphError) -> BundlingError {
  BundlingError::graph(error, BundlingPhase::Packaging)
}

fn push_unique(values: &mut Vec<NodeId>, value: NodeId) {
  if !values.contains(&value) {
    values.push(value);
  }
}

impl<'a> PackageBuilder<'a> {
  fn decision(&mut self, phase: &'static str, kind: DecisionKind) {
    if let Some(decisions) = &mut self.decisions {
      decisions.push(phase, kind);
    }
  }

  fn component(&self, component: NodeId) -> Result<&'a Component, BundlingError> {
    let dominators = self.dominators;
    dominators.component(component).ok_or_else(|| {
      BundlingError::invalid(
        BundlingPhase::Packaging,
        format!("condensed node {component} is not a component"),
      )
    })
  }

  fn package_mut(&mut self, package: NodeId) -> Result<&mut Package, BundlingError> {
    self.graph.get_node_mut(package).map_err(packaging)
  }

  // Phase 1: package roots
  fn create_roots(&mut self) -> Result<(), BundlingError> {
    let dominators = self.dominators;

    for entry in dominators.entries() {
      let package = match self.package_by_component.get(&entry.component) {
        Some(package) => *package,
        None => self.create_root(entry.component, PackageKind::Entry)?,
      };
      push_unique(&mut self.package_mut(package)?.dependencies, entry.dependency);
    }

    let super_root = dominators.super_root();
    for component_id in dominators.reverse_postorder() {
      if *component_id == super_root || self.package_by_component.contains_key(component_id) {
        continue;
      }

      let component = self.component(*component_id)?;
      let kind = if component.has_async_entry_point {
        PackageKind::Async
      } else if component.has_parallel_entry_point {
        PackageKind::Parallel
      } else if dominators.immediate_dominator(*component_id) == Some(super_root) {
        PackageKind::Shared
      } else {
        continue;
      };

      self.create_root(*component_id, kind)?;
    }

    Ok(())
  }

  fn create_root(
    &mut self,
    component_id: NodeId,
    kind: PackageKind,
  ) -> Result<NodeId, BundlingError> {
    let component = self.component(component_id)?;
    let asset_graph = self.asset_graph;

    let bundle_type = component
      .assets
      .first()
      .and_then(|asset| asset_graph.get_asset(*asset))
      .map(|asset| asset.file_type.bundle_type())
      .unwrap_or_default();

    let package = self.graph.add_node(Package {
      kind,
      component: component_id,
      components: vec![component_id],
      root_assets: component.assets.clone(),
      assets: component.assets.iter().copied().collect(),
      dependencies: Vec::new(),
      lazy_dependencies: Vec::new(),
      lazy_packages: Vec::new(),
      parallel_packages: Vec::new(),
      target: None,
      bundle_type,
    });

    self.package_by_component.insert(component_id, package);
    for asset in &component.assets {
      self.package_by_asset.insert(*asset, package);
    }

    if self.decisions.is_some() {
      let assets = component
        .assets
        .iter()
        .filter_map(|asset| asset_graph.get_asset(*asset))
        .map(|asset| asset.id.clone())
        .collect();

      self.decision(
        "roots",
        DecisionKind::PackageRootCreated {
          kind,
          component: component_id,
          assets,
        },
      );
    }

    Ok(package)
  }

  // Phase 2: every other component joins the package of its immediate dominator
  fn assign_components(&mut self) -> Result<(), BundlingError> {
    let dominators = self.dominators;
    let super_root = dominators.super_root();

    for component_id in dominators.reverse_postorder() {
      if *component_id == super_root || self.package_by_component.contains_key(component_id) {
        continue;
      }

      let package = dominators
        .immediate_dominator(*component_id)
        .and_then(|idom| self.package_by_component.get(&idom).copied())
        .ok_or_else(|| {
          BundlingError::invalid(
            BundlingPhase::Packaging,
            format!("component {component_id} was reached before its immediate dominator"),
          )
        })?;

      let component = self.component(*component_id)?;
      self.package_by_component.insert(*component_id, package);
      for asset in &component.assets {
        self.package_by_asset.insert(*asset, package);
      }

      let package_node = self.package_mut(package)?;
      package_node.components.push(*component_id);
      package_node.assets.extend(component.assets.iter().copied());

      self.decision(
        "assignment",
        DecisionKind::ComponentAssigned {
          component: *component_id,
          package,
        },
      );
    }

    for (component_id, component) in dominators.components() {
      if dominators.is_reachable(component_id) {
        continue;
      }

      debug!(
        component = %component_id,
        assets = component.assets.len(),
        "No entry reaches component"
      );
      self.decision(
        "assignment",
        DecisionKind::ComponentUnreachable {
          component: component_id,
        },
      );
    }

    Ok(())
  }

  // Phase 3: relations between packages
  fn connect_packages(&mut self) -> Result<(), BundlingError> {
    let dominators = self.dominators;

    for (from, to) in dominators.graph().edges() {
      let (Some(from), Some(to)) = (
        self.package_by_component.get(&from).copied(),
        self.package_by_component.get(&to).copied(),
      ) else {
        continue;
      };

      if from != to {
        self.graph.add_edge(from, to).map_err(packaging)?;
      }
    }

    for boundary in dominators.boundaries() {
      let (Some(from), Some(to)) = (
        self.package_by_component.get(&boundary.from).copied(),
        self.package_by_component.get(&boundary.to).copied(),
      ) else {
        continue;
      };

      // The target is already loaded by the importing package
      if from == to {
        continue;
      }

      let from_package = self.package_mut(from)?;
      match boundary.kind {
        BoundaryKind::Lazy => push_unique(&mut from_package.lazy_packages, to),
        BoundaryKind::Parallel => push_unique(&mut from_package.parallel_packages, to),
      }

      let to_package = self.package_mut(to)?;
      match (to_package.kind, boundary.kind) {
        (PackageKind::Entry, BoundaryKind::Lazy) => {
          push_unique(&mut to_package.lazy_dependencies, boundary.dependency)
        }
        (PackageKind::Entry, BoundaryKind::Parallel) => {}
        _ => push_unique(&mut to_package.dependencies, boundary.dependency),
      }
    }

    Ok(())
  }

  // Phase 4: entry targets flow to every package an entry loads, first entry wins
  fn resolve_targets(&mut self) -> Result<(), BundlingError> {
    let asset_graph = self.asset_graph;
    let mut queue = VecDeque::new();

    for package_id in self.graph.node_ids().collect::<Vec<_>>() {
      let package = self.package_mut(package_id)?;
      if package.kind != PackageKind::Entry {
        continue;
      }

      package.target = package.dependencies.iter().find_map(|dependency| {
        asset_graph
          .get_dependency(*dependency)
          .and_then(|dependency| dependency.target.as_deref().cloned())
      });

      if package.target.is_some() {
        queue.push_back(package_id);
      }
    }

    while let Some(package_id) = queue.pop_front() {
      let package = self.graph.get_node(package_id).map_err(packaging)?;
      let target = package.target.clone();
      let loaded = self
        .graph
        .outgoing_neighbors(package_id)
        .map_err(packaging)?
        .iter()
        .chain(&package.parallel_packages)
        .chain(&package.lazy_packages)
        .copied()
        .collect::<Vec<_>>();

      for next in loaded {
        let next_package = self.package_mut(next)?;
        if next_package.target.is_none() {
          next_package.target = target.clone();
          queue.push_back(next);
        }
      }
    }

    Ok(())
  }
}
