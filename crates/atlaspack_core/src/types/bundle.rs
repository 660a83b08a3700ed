use serde::Deserialize;
use serde::Serialize;

use super::{AssetId, FileType, Target};

/// An output unit created by the bundler
#[derive(Clone, Debug, Deserialize, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
  /// Stable identifier of the bundle
  pub id: String,

  /// Shortened form of the id that is embedded in runtime code
  pub public_id: Option<String>,

  /// The type of the bundle, derived from its entry asset
  #[serde(rename = "type")]
  pub bundle_type: FileType,

  /// Assets that are executed when the bundle loads
  pub entry_asset_ids: Vec<AssetId>,

  /// The asset whose exports the bundle exposes
  ///
  /// Shared bundles have no main entry.
  pub main_entry_id: Option<AssetId>,

  /// Output file name
  pub name: Option<String>,

  /// Whether the name must stay the same when the contents change
  pub needs_stable_name: bool,

  /// Whether assets of this bundle may be split out into other bundles
  pub is_splittable: bool,

  /// Where the bundle is written
  pub target: Target,
}
