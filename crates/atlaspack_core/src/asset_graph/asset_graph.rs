use std::collections::HashMap;
use std::sync::Arc;

use atlaspack_graph::{DirectedGraph, GraphError, NodeId, TraversalAction};

use crate::types::Asset;
use crate::types::Dependency;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DependencyState {
  #[default]
  New,
  Deferred,
  /// The dependency was optimized away upstream and loads nothing
  Excluded,
  Resolved,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DependencyNode {
  pub dependency: Arc<Dependency>,
  pub state: DependencyState,
}

#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum AssetGraphNode {
  Root,
  Asset(Arc<Asset>),
  Dependency(DependencyNode),
}

/// The graph of assets and dependencies that gets partitioned into bundles.
///
/// Edges run `Root -> entry dependency -> asset -> dependency -> asset`. Nodes are deduplicated by
/// content key (asset id or dependency id): adding the same asset twice replaces the payload and
/// keeps the node id.
#[derive(Clone, Debug)]
pub struct AssetGraph {
  graph: DirectedGraph<AssetGraphNode>,
  content_key_to_node_id: HashMap<String, NodeId>,
  root_node_id: NodeId,
}

impl Default for AssetGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl AssetGraph {
  pub fn new() -> Self {
    let mut graph = DirectedGraph::new();
    let root_node_id = graph.add_root_node(AssetGraphNode::Root);

    AssetGraph {
      graph,
      content_key_to_node_id: HashMap::new(),
      root_node_id,
    }
  }

  pub fn graph(&self) -> &DirectedGraph<AssetGraphNode> {
    &self.graph
  }

  pub fn root_node(&self) -> NodeId {
    self.root_node_id
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  pub fn get_node(&self, node_id: NodeId) -> Option<&AssetGraphNode> {
    self.graph.get_node(node_id).ok()
  }

  pub fn get_node_id_by_content_key(&self, content_key: &str) -> Option<NodeId> {
    self.content_key_to_node_id.get(content_key).copied()
  }

  fn add_node(&mut self, content_key: String, node: AssetGraphNode) -> NodeId {
    if let Some(existing_node_id) = self.content_key_to_node_id.get(&content_key) {
      if let Ok(existing) = self.graph.get_node_mut(*existing_node_id) {
        *existing = node;
        return *existing_node_id;
      }
    }

    let node_id = self.graph.add_node(node);
    self.content_key_to_node_id.insert(content_key, node_id);
    node_id
  }

  pub fn add_asset(&mut self, asset: Arc<Asset>) -> NodeId {
    self.add_node(asset.id.clone(), AssetGraphNode::Asset(asset))
  }

  pub fn add_dependency(&mut self, dependency: Dependency) -> NodeId {
    self.add_node(
      dependency.id(),
      AssetGraphNode::Dependency(DependencyNode {
        dependency: Arc::new(dependency),
        state: DependencyState::New,
      }),
    )
  }

  /// Adds a dependency and connects it to the root node.
  pub fn add_entry_dependency(&mut self, dependency: Dependency) -> NodeId {
    let dependency_id = self.add_dependency(dependency);
    self.graph.add_edge(self.root_node_id, dependency_id).ok();
    dependency_id
  }

  pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
    self.graph.add_edge(from, to)
  }

  pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
    self.graph.has_edge(from, to)
  }

  pub fn outgoing_neighbors(&self, node_id: NodeId) -> Result<&[NodeId], GraphError> {
    self.graph.outgoing_neighbors(node_id)
  }

  pub fn incoming_neighbors(&self, node_id: NodeId) -> Result<&[NodeId], GraphError> {
    self.graph.incoming_neighbors(node_id)
  }

  pub fn get_asset(&self, node_id: NodeId) -> Option<&Arc<Asset>> {
    let AssetGraphNode::Asset(asset) = self.get_node(node_id)? else {
      return None;
    };
    Some(asset)
  }

  pub fn get_dependency_node(&self, node_id: NodeId) -> Option<&DependencyNode> {
    let AssetGraphNode::Dependency(dependency_node) = self.get_node(node_id)? else {
      return None;
    };
    Some(dependency_node)
  }

  pub fn get_dependency(&self, node_id: NodeId) -> Option<&Arc<Dependency>> {
    self
      .get_dependency_node(node_id)
      .map(|dependency_node| &dependency_node.dependency)
  }

  pub fn set_dependency_state(
    &mut self,
    node_id: NodeId,
    state: DependencyState,
  ) -> Result<(), GraphError> {
    match self.graph.get_node_mut(node_id)? {
      AssetGraphNode::Dependency(dependency_node) => {
        dependency_node.state = state;
        Ok(())
      }
      _ => Err(GraphError::InvalidGraphState(format!(
        "node {node_id} is not a dependency"
      ))),
    }
  }

  /// Whether the dependency was excluded upstream. Non-dependency nodes are never skipped.
  pub fn is_dependency_skipped(&self, node_id: NodeId) -> bool {
    self
      .get_dependency_node(node_id)
      .is_some_and(|dependency_node| dependency_node.state == DependencyState::Excluded)
  }

  /// The asset a dependency resolved to, if any.
  pub fn resolve_dependency_asset(&self, dependency_node_id: NodeId) -> Option<NodeId> {
    self
      .graph
      .outgoing_neighbors(dependency_node_id)
      .ok()?
      .iter()
      .copied()
      .find(|node_id| self.get_asset(*node_id).is_some())
  }

  /// Asset nodes in insertion order.
  pub fn assets(&self) -> impl Iterator<Item = (NodeId, &Arc<Asset>)> + '_ {
    self.graph.nodes().filter_map(|(node_id, node)| match node {
      AssetGraphNode::Asset(asset) => Some((node_id, asset)),
      _ => None,
    })
  }

  /// Dependency nodes in insertion order.
  pub fn dependencies(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> + '_ {
    self.graph.nodes().filter_map(|(node_id, node)| match node {
      AssetGraphNode::Dependency(dependency_node) => Some((node_id, dependency_node)),
      _ => None,
    })
  }

  /// Depth-first traversal from `start`.
  ///
  /// With `skip_unused_dependencies`, excluded dependencies are neither visited nor descended
  /// into.
  pub fn traverse<F>(
    &self,
    start: NodeId,
    skip_unused_dependencies: bool,
    mut visitor: F,
  ) -> Result<(), GraphError>
  where
    F: FnMut(NodeId, &AssetGraphNode) -> TraversalAction,
  {
    self.graph.traverse(start, |node_id, node| {
      if let AssetGraphNode::Dependency(dependency_node) = node {
        if skip_unused_dependencies && dependency_node.state == DependencyState::Excluded {
          return TraversalAction::SkipChildren;
        }
      }

      visitor(node_id, node)
    })
  }
}
