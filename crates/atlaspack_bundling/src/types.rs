use atlaspack_graph::NodeId;

use crate::packages::PackageKind;

/// Summary of a bundling run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundlingStats {
  pub assets: usize,
  pub dependencies: usize,
  pub components: usize,
  pub cyclic_components: usize,
  pub packages: usize,
  pub bundles: usize,
  pub bundle_groups: usize,
  pub internalized_dependencies: usize,
}

/// Typed decision event.
///
/// This is intended for debugging/visualization and should not be used for correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionKind {
  PackageRootCreated {
    kind: PackageKind,
    component: NodeId,
    /// Asset ids of the root component
    assets: Vec<String>,
  },
  ComponentAssigned {
    component: NodeId,
    package: NodeId,
  },
  /// No entry reaches the component, so none of its assets are bundled
  ComponentUnreachable {
    component: NodeId,
  },
}

/// Single decision event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
  /// Monotonically increasing sequence number assigned by the logger.
  pub seq: u64,

  /// Phase name (free-form).
  pub phase: &'static str,

  pub kind: DecisionKind,
}

/// A collection of decisions captured during a bundling run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecisionLog {
  next_seq: u64,
  pub decisions: Vec<Decision>,
}

impl DecisionLog {
  pub fn push(&mut self, phase: &'static str, kind: DecisionKind) {
    let seq = self.next_seq;
    self.next_seq += 1;

    self.decisions.push(Decision { seq, phase, kind });
  }

  pub fn is_empty(&self) -> bool {
    self.decisions.is_empty()
  }

  pub fn len(&self) -> usize {
    self.decisions.len()
  }
}
