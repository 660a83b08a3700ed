//! Immediate dominators for a rooted [`DirectedGraph`].
//!
//! This is the iterative data-flow algorithm from Cooper, Harvey and Kennedy, "A Simple, Fast
//! Dominance Algorithm". It converges in a couple of passes on the mostly acyclic graphs the
//! bundler feeds it, and needs nothing but a reverse postorder and the predecessor lists.

use fixedbitset::FixedBitSet;

use crate::{DirectedGraph, GraphError, NodeId};

const UNREACHABLE: usize = usize::MAX;

/// Immediate dominators of every node reachable from `root`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dominators {
  root: NodeId,
  immediate_dominators: Vec<Option<NodeId>>,
  reverse_postorder: Vec<NodeId>,
}

impl Dominators {
  pub fn root(&self) -> NodeId {
    self.root
  }

  /// The immediate dominator of `node_id`.
  ///
  /// `None` for the root and for nodes not reachable from it.
  pub fn immediate_dominator(&self, node_id: NodeId) -> Option<NodeId> {
    if node_id == self.root {
      return None;
    }

    self
      .immediate_dominators
      .get(node_id.index())
      .copied()
      .flatten()
  }

  pub fn is_reachable(&self, node_id: NodeId) -> bool {
    node_id == self.root || self.immediate_dominator(node_id).is_some()
  }

  /// Reachable nodes in reverse postorder; every node comes after its immediate dominator.
  pub fn reverse_postorder(&self) -> &[NodeId] {
    &self.reverse_postorder
  }

  /// Walks from `node_id` up to the root, yielding `node_id` first.
  ///
  /// Yields nothing for unreachable nodes.
  pub fn dominators(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    let start = self.is_reachable(node_id).then_some(node_id);
    std::iter::successors(start, move |current| self.immediate_dominator(*current))
  }

  /// Whether `dominator` dominates `node_id`. Every reachable node dominates itself.
  pub fn dominates(&self, dominator: NodeId, node_id: NodeId) -> bool {
    self.dominators(node_id).any(|current| current == dominator)
  }

  /// Nodes whose immediate dominator is `node_id`, in reverse postorder.
  pub fn children(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    self
      .reverse_postorder
      .iter()
      .copied()
      .filter(move |child| self.immediate_dominator(*child) == Some(node_id))
  }
}

/// Computes the immediate dominators of `graph` from `root`.
pub fn simple_fast<N>(graph: &DirectedGraph<N>, root: NodeId) -> Result<Dominators, GraphError> {
  let reverse_postorder = reverse_postorder(graph, root)?;

  let mut order = vec![UNREACHABLE; graph.node_bound()];
  for (position, node_id) in reverse_postorder.iter().enumerate() {
    order[node_id.index()] = position;
  }

  let mut idom: Vec<Option<NodeId>> = vec![None; graph.node_bound()];
  idom[root.index()] = Some(root);

  let mut changed = true;
  while changed {
    changed = false;

    for &node_id in reverse_postorder.iter().skip(1) {
      let mut new_idom: Option<NodeId> = None;

      for &predecessor in graph.incoming_neighbors(node_id)? {
        if order[predecessor.index()] == UNREACHABLE || idom[predecessor.index()].is_none() {
          continue;
        }

        new_idom = Some(match new_idom {
          None => predecessor,
          Some(current) => intersect(&idom, &order, predecessor, current)?,
        });
      }

      let new_idom = new_idom.ok_or_else(|| {
        GraphError::InvalidGraphState(format!(
          "node {node_id} is reachable but has no processed predecessor"
        ))
      })?;

      if idom[node_id.index()] != Some(new_idom) {
        idom[node_id.index()] = Some(new_idom);
        changed = true;
      }
    }
  }

  idom[root.index()] = None;

  Ok(Dominators {
    root,
    immediate_dominators: idom,
    reverse_postorder,
  })
}

fn intersect(
  idom: &[Option<NodeId>],
  order: &[usize],
  mut finger1: NodeId,
  mut finger2: NodeId,
) -> Result<NodeId, GraphError> {
  let climb = |finger: NodeId| {
    idom[finger.index()].ok_or_else(|| {
      GraphError::InvalidGraphState(format!("node {finger} has no immediate dominator yet"))
    })
  };

  while finger1 != finger2 {
    while order[finger1.index()] > order[finger2.index()] {
      finger1 = climb(finger1)?;
    }
    while order[finger2.index()] > order[finger1.index()] {
      finger2 = climb(finger2)?;
    }
  }

  Ok(finger1)
}

/// Reverse postorder of the nodes reachable from `root`, children taken in edge order.
pub fn reverse_postorder<N>(
  graph: &DirectedGraph<N>,
  root: NodeId,
) -> Result<Vec<NodeId>, GraphError> {
  graph.get_node(root)?;

  let mut visited = FixedBitSet::with_capacity(graph.node_bound());
  let mut postorder = Vec::with_capacity(graph.node_count());
  let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
  visited.insert(root.index());

  while let Some((node_id, edge_position)) = stack.last().copied() {
    let neighbors = graph.outgoing_neighbors(node_id)?;

    if let Some(&next) = neighbors.get(edge_position) {
      if let Some(frame) = stack.last_mut() {
        frame.1 += 1;
      }
      if !visited.put(next.index()) {
        stack.push((next, 0));
      }
      continue;
    }

    stack.pop();
    postorder.push(node_id);
  }

  postorder.reverse();
  Ok(postorder)
}

#[cfg(test)]
mod tests {
  use petgraph::graph::NodeIndex;
  use pretty_assertions::assert_eq;
  use rand::{rngs::StdRng, Rng, SeedableRng};

  use super::*;

  #[test]
  fn test_chain() {
    // root -> a -> b
    let mut graph = DirectedGraph::new();
    let root = graph.add_node(());
    let a = graph.add_node(());
    let b = graph.add_node(());
    graph.add_edge(root, a).unwrap();
    graph.add_edge(a, b).unwrap();

    let dominators = simple_fast(&graph, root).unwrap();

    assert_eq!(dominators.immediate_dominator(root), None);
    assert_eq!(dominators.immediate_dominator(a), Some(root));
    assert_eq!(dominators.immediate_dominator(b), Some(a));
    assert_eq!(dominators.dominators(b).collect::<Vec<_>>(), vec![b, a, root]);
    assert!(dominators.dominates(a, b));
    assert!(!dominators.dominates(b, a));
  }

  #[test]
  fn test_diamond() {
    // root -> a -> c
    // root -> b -> c
    let mut graph = DirectedGraph::new();
    let root = graph.add_node(());
    let a = graph.add_node(());
    let b = graph.add_node(());
    let c = graph.add_node(());
    graph.add_edge(root, a).unwrap();
    graph.add_edge(root, b).unwrap();
    graph.add_edge(a, c).unwrap();
    graph.add_edge(b, c).unwrap();

    let dominators = simple_fast(&graph, root).unwrap();

    assert_eq!(dominators.immediate_dominator(c), Some(root));
    assert_eq!(dominators.children(root).count(), 3);
  }

  #[test]
  fn test_unreachable_nodes_have_no_dominator() {
    let mut graph = DirectedGraph::new();
    let root = graph.add_node(());
    let orphan = graph.add_node(());

    let dominators = simple_fast(&graph, root).unwrap();

    assert_eq!(dominators.immediate_dominator(orphan), None);
    assert!(!dominators.is_reachable(orphan));
    assert_eq!(dominators.dominators(orphan).count(), 0);
    assert_eq!(dominators.reverse_postorder(), &[root]);
  }

  #[test]
  fn test_unknown_root_fails() {
    let graph = DirectedGraph::<()>::new();

    assert_eq!(
      simple_fast(&graph, NodeId::new(0)),
      Err(GraphError::UnknownNode(NodeId::new(0)))
    );
  }

  #[test]
  fn test_reverse_postorder_places_dominators_first() {
    let mut graph = DirectedGraph::new();
    let root = graph.add_node(());
    let a = graph.add_node(());
    let b = graph.add_node(());
    graph.add_edge(root, a).unwrap();
    graph.add_edge(root, b).unwrap();
    graph.add_edge(b, a).unwrap();

    assert_eq!(reverse_postorder(&graph, root).unwrap(), vec![root, b, a]);
  }

  #[test]
  fn test_matches_petgraph_on_random_graphs() {
    for seed in 0..30 {
      let mut rng = StdRng::seed_from_u64(seed);
      let mut graph = DirectedGraph::new();
      let ids = (0..40).map(|_| graph.add_node(())).collect::<Vec<_>>();
      for _ in 0..70 {
        let from = ids[rng.gen_range(0..ids.len())];
        let to = ids[rng.gen_range(1..ids.len())];
        graph.add_edge(from, to).unwrap();
      }

      let mut petgraph_graph = petgraph::graph::DiGraph::<(), ()>::new();
      for _ in &ids {
        petgraph_graph.add_node(());
      }
      for (from, to) in graph.edges() {
        petgraph_graph.add_edge(NodeIndex::new(from.index()), NodeIndex::new(to.index()), ());
      }

      let ours = simple_fast(&graph, ids[0]).unwrap();
      let theirs = petgraph::algo::dominators::simple_fast(&petgraph_graph, NodeIndex::new(0));

      for node_id in &ids {
        assert_eq!(
          ours.immediate_dominator(*node_id).map(|n| n.index()),
          theirs
            .immediate_dominator(NodeIndex::new(node_id.index()))
            .map(|n| n.index()),
          "seed {seed}, node {node_id}"
        );
      }
    }
  }
}
