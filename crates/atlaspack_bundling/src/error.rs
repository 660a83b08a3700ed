use std::fmt::{Display, Formatter};

use atlaspack_graph::{GraphError, NodeId};
use thiserror::Error;

/// Pipeline phase an error was raised in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundlingPhase {
  Condensation,
  Dominators,
  Packaging,
  Materialization,
}

impl Display for BundlingPhase {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      BundlingPhase::Condensation => "condensation",
      BundlingPhase::Dominators => "dominators",
      BundlingPhase::Packaging => "packaging",
      BundlingPhase::Materialization => "materialization",
    };

    write!(f, "{name}")
  }
}

/// Errors are fatal for the build that raised them.
#[derive(Debug, Error)]
pub enum BundlingError {
  #[error("Unknown node {node} during {phase}")]
  UnknownNode { node: NodeId, phase: BundlingPhase },

  #[error("Invalid graph state during {phase}: {message}")]
  InvalidGraphState {
    phase: BundlingPhase,
    message: String,
  },

  /// The package is not reachable from any entry that carries a target
  #[error("Package {package} rooted at asset {asset} has no target")]
  MissingTarget { package: NodeId, asset: String },

  #[error(transparent)]
  BundleGraph(#[from] anyhow::Error),
}

impl BundlingError {
  pub(crate) fn graph(error: GraphError, phase: BundlingPhase) -> Self {
    match error {
      GraphError::UnknownNode(node) => BundlingError::UnknownNode { node, phase },
      GraphError::InvalidGraphState(message) => BundlingError::InvalidGraphState { phase, message },
    }
  }

  pub(crate) fn invalid(phase: BundlingPhase, message: impl Into<String>) -> Self {
    BundlingError::InvalidGraphState {
      phase,
      message: message.into(),
    }
  }
}
