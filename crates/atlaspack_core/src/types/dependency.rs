use std::hash::Hash;
use std::hash::Hasher;

use serde::Deserialize;
use serde::Serialize;
use serde_repr::Deserialize_repr;
use serde_repr::Serialize_repr;

use crate::hash::IdentifierHasher;

use super::asset::AssetId;
use super::target::Target;

pub fn create_dependency_id(
  source_asset_id: Option<&AssetId>,
  specifier: &str,
  target: Option<&Target>,
  priority: &Priority,
) -> String {
  let mut hasher = IdentifierHasher::new();

  source_asset_id.hash(&mut hasher);
  specifier.hash(&mut hasher);
  target.hash(&mut hasher);
  priority.hash(&mut hasher);

  let hash = hasher.finish();
  format!("{:016x}", hash)
}

/// A dependency denotes a connection between two assets
#[derive(Hash, PartialEq, Eq, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
  /// Determines when the dependency should be loaded
  pub priority: Priority,

  /// The id of the asset with this dependency
  pub source_asset_id: Option<AssetId>,

  /// The import or export specifier that connects two assets together
  pub specifier: String,

  /// The target associated with an entry, if any
  #[serde(default)]
  pub target: Option<Box<Target>>,

  /// Whether the dependency is an entry
  pub is_entry: bool,

  /// Indicates that the name should be stable over time, even when the content of the bundle changes
  ///
  /// This is useful for entries that a user would manually enter the URL for, as well as for
  /// things like service workers or RSS feeds, where the URL must remain consistent over time.
  ///
  pub needs_stable_name: bool,
}

impl Dependency {
  pub fn id(&self) -> String {
    create_dependency_id(
      self.source_asset_id.as_ref(),
      &self.specifier,
      self.target.as_deref(),
      &self.priority,
    )
  }

  pub fn entry(entry: String, target: Target) -> Dependency {
    Dependency {
      is_entry: true,
      needs_stable_name: true,
      specifier: entry,
      target: Some(Box::new(target)),
      ..Dependency::default()
    }
  }

  pub fn new(specifier: String, source_asset_id: AssetId, priority: Priority) -> Dependency {
    Dependency {
      priority,
      source_asset_id: Some(source_asset_id),
      specifier,
      ..Dependency::default()
    }
  }

  /// Entry dependencies are either flagged as such or carry the target they build for.
  pub fn is_entry_dependency(&self) -> bool {
    self.is_entry || self.target.is_some()
  }
}

/// Determines when a dependency should load
#[derive(Clone, Copy, Debug, Default, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
pub enum Priority {
  /// Resolves the dependency synchronously, placing the resolved asset in the same bundle as the parent or another bundle that is already on the page
  #[default]
  Sync = 0,
  /// Places the dependency in a separate bundle loaded in parallel with the current bundle
  Parallel = 1,
  /// The dependency should be placed in a separate bundle that is loaded later
  Lazy = 2,
  /// The dependency should be placed in a separate bundle that is loaded conditionally
  Conditional = 3,
}

impl Priority {
  /// Lazy and conditional imports are loaded on demand, after their importer has run.
  pub fn is_async(self) -> bool {
    matches!(self, Priority::Lazy | Priority::Conditional)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dependency_ids_differ_by_priority() {
    let sync = Dependency::new(String::from("./a"), String::from("index"), Priority::Sync);
    let lazy = Dependency::new(String::from("./a"), String::from("index"), Priority::Lazy);

    assert_ne!(sync.id(), lazy.id());
    assert_eq!(sync.id(), sync.clone().id());
  }

  #[test]
  fn test_entry_dependencies() {
    let entry = Dependency::entry(String::from("src/index.js"), Target::default());

    assert!(entry.is_entry_dependency());
    assert!(entry.needs_stable_name);
    assert!(!Dependency::default().is_entry_dependency());
  }

  #[test]
  fn test_priority_is_serialized_as_number() {
    assert_eq!(serde_json::to_string(&Priority::Lazy).unwrap(), "2");
    assert!(Priority::Conditional.is_async());
    assert!(!Priority::Parallel.is_async());
  }
}
