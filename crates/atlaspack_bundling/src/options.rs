use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for [`crate::DominatorBundler`].
///
/// Every field is optional in serialized form; missing fields take their defaults.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DominatorBundlerOptions {
  /// Ignore dependencies that were excluded upstream
  pub skip_unused_dependencies: bool,

  /// Start a parallel package where the bundle type changes, e.g. JS importing CSS
  pub split_on_type_change: bool,

  /// Record a decision log while creating packages
  pub collect_debug: bool,
}

impl Default for DominatorBundlerOptions {
  fn default() -> Self {
    Self {
      skip_unused_dependencies: true,
      split_on_type_change: true,
      collect_debug: false,
    }
  }
}

impl DominatorBundlerOptions {
  pub fn from_json(json: &str) -> anyhow::Result<Self> {
    serde_json::from_str(json).context("Invalid dominator bundler options")
  }
}
