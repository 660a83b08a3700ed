use std::collections::HashMap;

use atlaspack_core::asset_graph::AssetGraph;
use atlaspack_core::types::Priority;
use atlaspack_graph::{
  find_strongly_connected_components, simple_fast, DirectedGraph, Dominators, NodeId,
};
use tracing::{debug, instrument};

use crate::error::{BundlingError, BundlingPhase};
use crate::options::DominatorBundlerOptions;

/// A strongly connected set of assets. Acyclic assets are singleton components.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Component {
  /// Host asset nodes in the order the SCC finder emitted them
  pub assets: Vec<NodeId>,
  pub is_entry: bool,
  /// Loaded through a lazy or conditional import from another component
  pub has_async_entry_point: bool,
  /// Loaded through a parallel import or a bundle type change from another component
  pub has_parallel_entry_point: bool,
}

impl Component {
  pub fn is_cyclic(&self) -> bool {
    self.assets.len() > 1
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CondensedNode {
  SuperRoot,
  Component(Component),
}

/// An entry dependency and the component its asset ended up in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryPoint {
  pub dependency: NodeId,
  pub asset: NodeId,
  pub component: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryKind {
  Lazy,
  Parallel,
}

/// A relation between two components that does not take part in dominance.
///
/// `from` and `to` are condensed node ids, `dependency` is the host dependency node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryEdge {
  pub from: NodeId,
  pub to: NodeId,
  pub dependency: NodeId,
  pub kind: BoundaryKind,
}

/// Dominator tree over the condensation of the asset graph.
///
/// The condensed graph holds a synthetic super-root, one node per component, the static edges
/// between components and an edge from the super-root to every entry and boundary target.
#[derive(Clone, Debug)]
pub struct AssetDominators {
  graph: DirectedGraph<CondensedNode>,
  super_root: NodeId,
  dominators: Dominators,
  entries: Vec<EntryPoint>,
  boundaries: Vec<BoundaryEdge>,
  component_by_asset: HashMap<NodeId, NodeId>,
}

impl AssetDominators {
  pub fn graph(&self) -> &DirectedGraph<CondensedNode> {
    &self.graph
  }

  pub fn super_root(&self) -> NodeId {
    self.super_root
  }

  pub fn immediate_dominator(&self, component: NodeId) -> Option<NodeId> {
    self.dominators.immediate_dominator(component)
  }

  pub fn is_reachable(&self, component: NodeId) -> bool {
    self.dominators.is_reachable(component)
  }

  /// Reachable condensed nodes, super-root first, every node after its immediate dominator.
  pub fn reverse_postorder(&self) -> &[NodeId] {
    self.dominators.reverse_postorder()
  }

  pub fn component(&self, component: NodeId) -> Option<&Component> {
    match self.graph.get_node(component).ok()? {
      CondensedNode::Component(component) => Some(component),
      CondensedNode::SuperRoot => None,
    }
  }

  /// Components in topological order.
  pub fn components(&self) -> impl Iterator<Item = (NodeId, &Component)> + '_ {
    self.graph.nodes().filter_map(|(node_id, node)| match node {
      CondensedNode::Component(component) => Some((node_id, component)),
      CondensedNode::SuperRoot => None,
    })
  }

  pub fn component_for_asset(&self, asset: NodeId) -> Option<NodeId> {
    self.component_by_asset.get(&asset).copied()
  }

  pub fn entries(&self) -> &[EntryPoint] {
    &self.entries
  }

  pub fn boundaries(&self) -> &[BoundaryEdge] {
    &self.boundaries
  }

  /// Components the given component imports synchronously.
  pub fn static_dependencies(&self, component: NodeId) -> &[NodeId] {
    self.graph.outgoing_neighbors(component).unwrap_or(&[])
  }
}

struct AssetRelation {
  from: NodeId,
  to: NodeId,
  dependency: NodeId,
  priority: Priority,
}

/// Condenses the asset graph and computes immediate dominators from a synthetic super-root.
///
/// A graph without entries yields a tree holding only the super-root.
#[instrument(level = "debug", skip_all)]
pub fn find_asset_dominators(
  asset_graph: &AssetGraph,
  options: &DominatorBundlerOptions,
) -> Result<AssetDominators, BundlingError> {
  let condensation = |error| BundlingError::graph(error, BundlingPhase::Condensation);
  let is_skipped = |dependency: NodeId| {
    options.skip_unused_dependencies && asset_graph.is_dependency_skipped(dependency)
  };

  // Phase 1: asset level graph. Relations between assets are derived through dependency nodes.
  let mut asset_level = DirectedGraph::<Option<NodeId>>::with_capacity(asset_graph.node_count());
  let asset_level_root = asset_level.add_root_node(None);

  let mut asset_nodes = Vec::new();
  let mut local_by_asset = HashMap::new();
  for (asset, _) in asset_graph.assets() {
    let local = asset_level.add_node(Some(asset));
    asset_nodes.push((asset, local));
    local_by_asset.insert(asset, local);
  }

  let mut relations = Vec::new();
  for (asset, local) in &asset_nodes {
    for dependency in asset_graph.outgoing_neighbors(*asset).map_err(condensation)? {
      let Some(dependency_node) = asset_graph.get_dependency_node(*dependency) else {
        continue;
      };
      if is_skipped(*dependency) {
        continue;
      }

      for target in asset_graph
        .outgoing_neighbors(*dependency)
        .map_err(condensation)?
      {
        let Some(target_local) = local_by_asset.get(target) else {
          continue;
        };

        asset_level
          .add_edge(*local, *target_local)
          .map_err(condensation)?;
        relations.push(AssetRelation {
          from: *asset,
          to: *target,
          dependency: *dependency,
          priority: dependency_node.dependency.priority,
        });
      }
    }
  }

  // Phase 2: entries
  let host_root = asset_graph.root_node();
  let mut entry_assets = Vec::new();
  for (dependency, dependency_node) in asset_graph.dependencies() {
    if is_skipped(dependency) {
      continue;
    }

    let is_entry = dependency_node.dependency.is_entry_dependency()
      || asset_graph
        .incoming_neighbors(dependency)
        .map_err(condensation)?
        .contains(&host_root);
    if !is_entry {
      continue;
    }

    for target in asset_graph
      .outgoing_neighbors(dependency)
      .map_err(condensation)?
    {
      if let Some(target_local) = local_by_asset.get(target) {
        asset_level
          .add_edge(asset_level_root, *target_local)
          .map_err(condensation)?;
        entry_assets.push((dependency, *target));
      }
    }
  }

  // Phase 3: condensation. Components are added in topological order.
  let components = find_strongly_connected_components(&asset_level).map_err(condensation)?;

  let mut graph = DirectedGraph::with_capacity(components.len());
  let super_root = graph.add_root_node(CondensedNode::SuperRoot);
  let mut component_by_asset = HashMap::new();

  for members in components.iter().rev() {
    let assets = members
      .iter()
      .filter_map(|local| asset_level.get_node(*local).ok().copied().flatten())
      .collect::<Vec<_>>();

    // The synthetic root
    if assets.is_empty() {
      continue;
    }

    let component = graph.add_node(CondensedNode::Component(Component {
      assets: assets.clone(),
      ..Component::default()
    }));
    for asset in assets {
      component_by_asset.insert(asset, component);
    }
  }

  let lookup = |asset: NodeId| {
    component_by_asset.get(&asset).copied().ok_or_else(|| {
      BundlingError::invalid(
        BundlingPhase::Condensation,
        format!("asset {asset} is not part of any component"),
      )
    })
  };

  let mut boundaries = Vec::new();
  for relation in &relations {
    let from = lookup(relation.from)?;
    let to = lookup(relation.to)?;

    // Cycles are never split
    if from == to {
      continue;
    }

    let kind = if relation.priority.is_async() {
      Some(BoundaryKind::Lazy)
    } else if relation.priority == Priority::Parallel
      || (options.split_on_type_change && is_type_change(asset_graph, relation))
    {
      Some(BoundaryKind::Parallel)
    } else {
      None
    };

    match kind {
      Some(kind) => boundaries.push(BoundaryEdge {
        from,
        to,
        dependency: relation.dependency,
        kind,
      }),
      None => graph.add_edge(from, to).map_err(condensation)?,
    }
  }

  let mut entries = Vec::with_capacity(entry_assets.len());
  for (dependency, asset) in entry_assets {
    entries.push(EntryPoint {
      dependency,
      asset,
      component: lookup(asset)?,
    });
  }

  // Phase 4: boundaries only count when their importer can be loaded at all
  let reachable = reachable_components(&graph, &entries, &boundaries)?;
  boundaries.retain(|boundary| reachable[boundary.from.index()]);

  for entry in &entries {
    component_mut(&mut graph, entry.component)?.is_entry = true;
    graph
      .add_edge(super_root, entry.component)
      .map_err(condensation)?;
  }

  for boundary in &boundaries {
    let component = component_mut(&mut graph, boundary.to)?;
    match boundary.kind {
      BoundaryKind::Lazy => component.has_async_entry_point = true,
      BoundaryKind::Parallel => component.has_parallel_entry_point = true,
    }
    graph
      .add_edge(super_root, boundary.to)
      .map_err(condensation)?;
  }

  // Phase 5: dominance
  let dominators = simple_fast(&graph, super_root)
    .map_err(|error| BundlingError::graph(error, BundlingPhase::Dominators))?;

  debug!(
    components = graph.node_count() - 1,
    entries = entries.len(),
    boundaries = boundaries.len(),
    reachable = dominators.reverse_postorder().len() - 1,
    "Computed asset dominators"
  );

  Ok(AssetDominators {
    graph,
    super_root,
    dominators,
    entries,
    boundaries,
    component_by_asset,
  })
}

fn is_type_change(asset_graph: &AssetGraph, relation: &AssetRelation) -> bool {
  match (
    asset_graph.get_asset(relation.from),
    asset_graph.get_asset(relation.to),
  ) {
    (Some(from), Some(to)) => from.file_type.bundle_type() != to.file_type.bundle_type(),
    _ => false,
  }
}

fn component_mut(
  graph: &mut DirectedGraph<CondensedNode>,
  node_id: NodeId,
) -> Result<&mut Component, BundlingError> {
  match graph
    .get_node_mut(node_id)
    .map_err(|error| BundlingError::graph(error, BundlingPhase::Condensation))?
  {
    CondensedNode::Component(component) => Ok(component),
    CondensedNode::SuperRoot => Err(BundlingError::invalid(
      BundlingPhase::Condensation,
      "the super-root is not a component",
    )),
  }
}

/// Components reachable from an entry through static and boundary edges.
fn reachable_components(
  graph: &DirectedGraph<CondensedNode>,
  entries: &[EntryPoint],
  boundaries: &[BoundaryEdge],
) -> Result<Vec<bool>, BundlingError> {
  let mut boundary_targets_by_component: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
  for boundary in boundaries {
    boundary_targets_by_component
      .entry(boundary.from)
      .or_default()
      .push(boundary.to);
  }

  let mut reachable = vec![false; graph.node_bound()];
  let mut stack = entries
    .iter()
    .map(|entry| entry.component)
    .collect::<Vec<_>>();

  while let Some(component) = stack.pop() {
    if reachable[component.index()] {
      continue;
    }
    reachable[component.index()] = true;

    let static_targets = graph
      .outgoing_neighbors(component)
      .map_err(|error| BundlingError::graph(error, BundlingPhase::Condensation))?;
    let boundary_targets = boundary_targets_by_component
      .get(&component)
      .map(Vec::as_slice)
      .unwrap_or_default();

    stack.extend(
      static_targets
        .iter()
        .chain(boundary_targets)
        .filter(|target| !reachable[target.index()]),
    );
  }

  Ok(reachable)
}
