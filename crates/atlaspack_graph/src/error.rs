use thiserror::Error;

use crate::NodeId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  /// The node id was never allocated by this graph, or the node has been removed
  #[error("Unknown node {0}")]
  UnknownNode(NodeId),

  /// An internal invariant did not hold, e.g. a reachable node without a processed predecessor
  #[error("Invalid graph state: {0}")]
  InvalidGraphState(String),
}
