use fixedbitset::FixedBitSet;

use crate::{DirectedGraph, GraphError, NodeId};

const UNDISCOVERED: usize = usize::MAX;

/// Finds the strongly connected components of `graph` with Tarjan's algorithm.
///
/// The depth-first search starts at the root node when there is one, then continues from every
/// node still undiscovered, in insertion order. Components are emitted as soon as they complete,
/// so a component always comes after every component it has an edge to (reverse topological
/// order). Members of a component are listed in the order they are popped off the Tarjan stack.
///
/// The traversal keeps its own stack, so deep graphs cannot overflow the call stack.
pub fn find_strongly_connected_components<N>(
  graph: &DirectedGraph<N>,
) -> Result<Vec<Vec<NodeId>>, GraphError> {
  let mut tarjan = Tarjan::new(graph.node_bound());

  if let Some(root) = graph.root_node_id() {
    tarjan.visit(graph, root)?;
  }

  for node_id in graph.node_ids() {
    if tarjan.index[node_id.index()] == UNDISCOVERED {
      tarjan.visit(graph, node_id)?;
    }
  }

  Ok(tarjan.components)
}

struct Tarjan {
  next_index: usize,
  index: Vec<usize>,
  low_link: Vec<usize>,
  on_stack: FixedBitSet,
  stack: Vec<NodeId>,
  components: Vec<Vec<NodeId>>,
}

impl Tarjan {
  fn new(node_bound: usize) -> Self {
    Self {
      next_index: 0,
      index: vec![UNDISCOVERED; node_bound],
      low_link: vec![UNDISCOVERED; node_bound],
      on_stack: FixedBitSet::with_capacity(node_bound),
      stack: Vec::new(),
      components: Vec::new(),
    }
  }

  fn discover(&mut self, node_id: NodeId) {
    let i = node_id.index();
    self.index[i] = self.next_index;
    self.low_link[i] = self.next_index;
    self.next_index += 1;
    self.stack.push(node_id);
    self.on_stack.insert(i);
  }

  fn visit<N>(&mut self, graph: &DirectedGraph<N>, start: NodeId) -> Result<(), GraphError> {
    // (node, position of the next outgoing edge to follow)
    let mut call_stack: Vec<(NodeId, usize)> = vec![(start, 0)];
    self.discover(start);

    while let Some((node_id, edge_position)) = call_stack.last().copied() {
      let neighbors = graph.outgoing_neighbors(node_id)?;

      if let Some(&next) = neighbors.get(edge_position) {
        if let Some(frame) = call_stack.last_mut() {
          frame.1 += 1;
        }

        if self.index[next.index()] == UNDISCOVERED {
          self.discover(next);
          call_stack.push((next, 0));
        } else if self.on_stack.contains(next.index()) {
          let i = node_id.index();
          self.low_link[i] = self.low_link[i].min(self.index[next.index()]);
        }
        continue;
      }

      call_stack.pop();

      let i = node_id.index();
      if self.low_link[i] == self.index[i] {
        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
          self.on_stack.set(member.index(), false);
          component.push(member);
          if member == node_id {
            break;
          }
        }
        self.components.push(component);
      }

      if let Some(&(parent, _)) = call_stack.last() {
        let p = parent.index();
        self.low_link[p] = self.low_link[p].min(self.low_link[i]);
      }
    }

    Ok(())
  }
}
