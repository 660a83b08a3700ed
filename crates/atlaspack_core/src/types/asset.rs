use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::file_type::FileType;

pub type AssetId = String;

/// A source file in the asset graph
///
/// Only the fields bundling decisions read are modelled here; the contents of an asset belong to
/// the transformer and packager.
#[derive(Clone, Debug, Default, Deserialize, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
  /// The main identify hash for the asset. It is consistent for the entire
  /// build and between builds.
  pub id: AssetId,

  /// The file path to the asset
  pub file_path: PathBuf,

  /// The file type of the asset, which may change during transformation
  #[serde(rename = "type")]
  pub file_type: FileType,
}

impl Asset {
  /// File name without extension, used to derive bundle names.
  pub fn file_stem(&self) -> Option<String> {
    self
      .file_path
      .file_stem()
      .map(|stem| stem.to_string_lossy().to_string())
  }
}
