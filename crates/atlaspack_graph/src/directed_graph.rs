use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use fixedbitset::FixedBitSet;

use crate::GraphError;

/// Opaque handle to a node of one [`DirectedGraph`].
///
/// Ids are allocated sequentially and never reused by the graph that created them, so they stay
/// meaningful for as long as that graph instance lives. They mean nothing to any other graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
  pub fn new(index: usize) -> Self {
    // u32 ids, a graph never holds more than u32::MAX nodes
    debug_assert!(u32::try_from(index).is_ok(), "node index {index} overflowed u32");
    Self(index as u32)
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl Display for NodeId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// What a traversal visitor wants to happen after seeing a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraversalAction {
  #[default]
  Continue,
  /// Do not descend into the outgoing neighbours of this node
  SkipChildren,
  /// End the traversal immediately
  Stop,
}

/// Mutable directed graph over an arena of node payloads.
///
/// Adjacency is kept in both directions and in edge insertion order, which is what makes the
/// algorithms built on top of it deterministic.
#[derive(Clone, Debug)]
pub struct DirectedGraph<N> {
  nodes: Vec<Option<N>>,
  outgoing: Vec<Vec<NodeId>>,
  incoming: Vec<Vec<NodeId>>,
  edges: HashSet<(NodeId, NodeId)>,
  root_node_id: Option<NodeId>,
  node_count: usize,
}

impl<N> Default for DirectedGraph<N> {
  fn default() -> Self {
    Self::new()
  }
}

impl<N> DirectedGraph<N> {
  pub fn new() -> Self {
    Self {
      nodes: Vec::new(),
      outgoing: Vec::new(),
      incoming: Vec::new(),
      edges: HashSet::new(),
      root_node_id: None,
      node_count: 0,
    }
  }

  pub fn with_capacity(nodes: usize) -> Self {
    Self {
      nodes: Vec::with_capacity(nodes),
      outgoing: Vec::with_capacity(nodes),
      incoming: Vec::with_capacity(nodes),
      ..Self::new()
    }
  }

  pub fn add_node(&mut self, payload: N) -> NodeId {
    let node_id = NodeId::new(self.nodes.len());
    self.nodes.push(Some(payload));
    self.outgoing.push(Vec::new());
    self.incoming.push(Vec::new());
    self.node_count += 1;
    node_id
  }

  /// Adds a node and designates it as the root.
  pub fn add_root_node(&mut self, payload: N) -> NodeId {
    let node_id = self.add_node(payload);
    self.root_node_id = Some(node_id);
    node_id
  }

  /// Removes the node and every edge touching it, returning its payload.
  pub fn remove_node(&mut self, node_id: NodeId) -> Result<N, GraphError> {
    let payload = self
      .nodes
      .get_mut(node_id.index())
      .and_then(Option::take)
      .ok_or(GraphError::UnknownNode(node_id))?;

    for target in std::mem::take(&mut self.outgoing[node_id.index()]) {
      self.incoming[target.index()].retain(|source| *source != node_id);
      self.edges.remove(&(node_id, target));
    }

    for source in std::mem::take(&mut self.incoming[node_id.index()]) {
      self.outgoing[source.index()].retain(|target| *target != node_id);
      self.edges.remove(&(source, node_id));
    }

    if self.root_node_id == Some(node_id) {
      self.root_node_id = None;
    }

    self.node_count -= 1;
    Ok(payload)
  }

  /// Adds an edge between two live nodes. Adding an existing edge is a no-op.
  pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
    self.assert_has_node(from)?;
    self.assert_has_node(to)?;

    if self.edges.insert((from, to)) {
      self.outgoing[from.index()].push(to);
      self.incoming[to.index()].push(from);
    }

    Ok(())
  }

  /// Removes an edge, returning whether it existed.
  pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool, GraphError> {
    self.assert_has_node(from)?;
    self.assert_has_node(to)?;

    if !self.edges.remove(&(from, to)) {
      return Ok(false);
    }

    self.outgoing[from.index()].retain(|target| *target != to);
    self.incoming[to.index()].retain(|source| *source != from);
    Ok(true)
  }

  pub fn has_node(&self, node_id: NodeId) -> bool {
    matches!(self.nodes.get(node_id.index()), Some(Some(_)))
  }

  pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
    self.edges.contains(&(from, to))
  }

  pub fn get_node(&self, node_id: NodeId) -> Result<&N, GraphError> {
    self
      .nodes
      .get(node_id.index())
      .and_then(Option::as_ref)
      .ok_or(GraphError::UnknownNode(node_id))
  }

  pub fn get_node_mut(&mut self, node_id: NodeId) -> Result<&mut N, GraphError> {
    self
      .nodes
      .get_mut(node_id.index())
      .and_then(Option::as_mut)
      .ok_or(GraphError::UnknownNode(node_id))
  }

  pub fn set_root_node_id(&mut self, node_id: NodeId) -> Result<(), GraphError> {
    self.assert_has_node(node_id)?;
    self.root_node_id = Some(node_id);
    Ok(())
  }

  pub fn root_node_id(&self) -> Option<NodeId> {
    self.root_node_id
  }

  /// Live node ids, in insertion order.
  pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter(|(_, node)| node.is_some())
      .map(|(index, _)| NodeId::new(index))
  }

  /// Live nodes and their payloads, in insertion order.
  pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(index, node)| node.as_ref().map(|node| (NodeId::new(index), node)))
  }

  /// All edges as `(from, to)` pairs, grouped by source in node insertion order.
  pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
    self
      .node_ids()
      .flat_map(move |from| self.outgoing[from.index()].iter().map(move |to| (from, *to)))
  }

  pub fn outgoing_neighbors(&self, node_id: NodeId) -> Result<&[NodeId], GraphError> {
    self.assert_has_node(node_id)?;
    Ok(&self.outgoing[node_id.index()])
  }

  pub fn incoming_neighbors(&self, node_id: NodeId) -> Result<&[NodeId], GraphError> {
    self.assert_has_node(node_id)?;
    Ok(&self.incoming[node_id.index()])
  }

  pub fn node_count(&self) -> usize {
    self.node_count
  }

  pub fn edge_count(&self) -> usize {
    self.edges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.node_count == 0
  }

  /// Upper bound (exclusive) of every id this graph has handed out, removed nodes included.
  ///
  /// Algorithms use it to size per-node side tables indexed by [`NodeId::index`].
  pub fn node_bound(&self) -> usize {
    self.nodes.len()
  }

  /// Depth-first pre-order traversal starting at `start`.
  ///
  /// Children are visited in edge insertion order and every node is visited at most once.
  pub fn traverse<F>(&self, start: NodeId, mut visitor: F) -> Result<(), GraphError>
  where
    F: FnMut(NodeId, &N) -> TraversalAction,
  {
    self.assert_has_node(start)?;

    let mut visited = FixedBitSet::with_capacity(self.node_bound());
    let mut stack = vec![start];

    while let Some(node_id) = stack.pop() {
      if visited.put(node_id.index()) {
        continue;
      }

      let node = self.get_node(node_id)?;
      match visitor(node_id, node) {
        TraversalAction::Stop => return Ok(()),
        TraversalAction::SkipChildren => continue,
        TraversalAction::Continue => {}
      }

      stack.extend(
        self.outgoing[node_id.index()]
          .iter()
          .rev()
          .filter(|child| !visited.contains(child.index())),
      );
    }

    Ok(())
  }

  fn assert_has_node(&self, node_id: NodeId) -> Result<(), GraphError> {
    if self.has_node(node_id) {
      Ok(())
    } else {
      Err(GraphError::UnknownNode(node_id))
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_add_and_get_nodes() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node("a");
    let b = graph.add_node("b");

    assert_eq!(graph.get_node(a), Ok(&"a"));
    assert_eq!(graph.get_node(b), Ok(&"b"));
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![a, b]);
  }

  #[test]
  fn test_node_ids_cover_the_u32_range() {
    let last = NodeId::new(u32::MAX as usize);

    assert_eq!(last.index(), u32::MAX as usize);
    assert_eq!(last.to_string(), u32::MAX.to_string());
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "overflowed u32")]
  fn test_node_ids_past_u32_panic_in_debug_builds() {
    NodeId::new(u32::MAX as usize + 1);
  }

  #[test]
  fn test_get_unknown_node_fails() {
    let graph = DirectedGraph::<()>::new();

    assert_eq!(
      graph.get_node(NodeId::new(3)),
      Err(GraphError::UnknownNode(NodeId::new(3)))
    );
  }

  #[test]
  fn test_edges_are_idempotent() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node(());
    let b = graph.add_node(());

    graph.add_edge(a, b).unwrap();
    graph.add_edge(a, b).unwrap();

    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.outgoing_neighbors(a).unwrap(), &[b]);
    assert_eq!(graph.incoming_neighbors(b).unwrap(), &[a]);
  }

  #[test]
  fn test_add_edge_to_unknown_node_fails() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node(());

    assert_eq!(
      graph.add_edge(a, NodeId::new(7)),
      Err(GraphError::UnknownNode(NodeId::new(7)))
    );
    assert_eq!(graph.edge_count(), 0);
  }

  #[test]
  fn test_remove_node_removes_touching_edges() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();
    graph.add_edge(a, c).unwrap();
    graph.set_root_node_id(b).unwrap();

    assert_eq!(graph.remove_node(b), Ok("b"));

    assert!(!graph.has_node(b));
    assert_eq!(graph.root_node_id(), None);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.outgoing_neighbors(a).unwrap(), &[c]);
    assert_eq!(graph.incoming_neighbors(c).unwrap(), &[a]);
    assert_eq!(graph.remove_node(b), Err(GraphError::UnknownNode(b)));
  }

  #[test]
  fn test_ids_are_not_reused_after_removal() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node(());
    graph.remove_node(a).unwrap();
    let b = graph.add_node(());

    assert_ne!(a, b);
    assert_eq!(graph.node_bound(), 2);
    assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![b]);
  }

  #[test]
  fn test_remove_edge() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node(());
    let b = graph.add_node(());
    graph.add_edge(a, b).unwrap();

    assert_eq!(graph.remove_edge(a, b), Ok(true));
    assert_eq!(graph.remove_edge(a, b), Ok(false));
    assert!(!graph.has_edge(a, b));
    assert!(graph.incoming_neighbors(b).unwrap().is_empty());
  }

  #[test]
  fn test_add_root_node() {
    let mut graph = DirectedGraph::new();
    graph.add_node("a");
    let root = graph.add_root_node("root");

    assert_eq!(graph.root_node_id(), Some(root));
    assert_eq!(graph.get_node(root), Ok(&"root"));
  }

  #[test]
  fn test_set_root_on_unknown_node_fails() {
    let mut graph = DirectedGraph::<()>::new();

    assert_eq!(
      graph.set_root_node_id(NodeId::new(0)),
      Err(GraphError::UnknownNode(NodeId::new(0)))
    );
  }

  #[test]
  fn test_traverse_visits_in_edge_order() {
    // root -> a -> c
    // root -> b -> c
    let mut graph = DirectedGraph::new();
    let root = graph.add_node("root");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    graph.add_edge(root, a).unwrap();
    graph.add_edge(root, b).unwrap();
    graph.add_edge(a, c).unwrap();
    graph.add_edge(b, c).unwrap();

    let mut visited = vec![];
    graph
      .traverse(root, |_, name| {
        visited.push(*name);
        TraversalAction::Continue
      })
      .unwrap();

    assert_eq!(visited, vec!["root", "a", "c", "b"]);
  }

  #[test]
  fn test_traverse_skip_children_and_stop() {
    let mut graph = DirectedGraph::new();
    let root = graph.add_node("root");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    graph.add_edge(root, a).unwrap();
    graph.add_edge(a, b).unwrap();
    graph.add_edge(root, c).unwrap();

    let mut visited = vec![];
    graph
      .traverse(root, |_, name| {
        visited.push(*name);
        match *name {
          "a" => TraversalAction::SkipChildren,
          _ => TraversalAction::Continue,
        }
      })
      .unwrap();
    assert_eq!(visited, vec!["root", "a", "c"]);

    let mut visited = vec![];
    graph
      .traverse(root, |_, name| {
        visited.push(*name);
        TraversalAction::Stop
      })
      .unwrap();
    assert_eq!(visited, vec!["root"]);
  }

  #[test]
  fn test_traverse_terminates_on_cycles() {
    let mut graph = DirectedGraph::new();
    let a = graph.add_node(());
    let b = graph.add_node(());
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, a).unwrap();

    let mut count = 0;
    graph
      .traverse(a, |_, _| {
        count += 1;
        TraversalAction::Continue
      })
      .unwrap();

    assert_eq!(count, 2);
  }
}
