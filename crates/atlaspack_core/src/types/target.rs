use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// A target represents where compiled bundles are written and how they are loaded
///
/// The bundling core never interprets a target; it is carried from the entry dependency onto
/// every bundle and bundle group created for that entry.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
  /// The output folder for compiled bundles
  pub dist_dir: PathBuf,

  /// The output filename of the entry
  pub dist_entry: Option<PathBuf>,

  /// The name of the target
  pub name: String,

  /// The URL bundles will be loaded with at runtime
  pub public_url: String,
}

impl Default for Target {
  fn default() -> Self {
    Self {
      dist_dir: PathBuf::from("dist"),
      dist_entry: None,
      name: String::from("default"),
      public_url: String::from("/"),
    }
  }
}
