use std::path::PathBuf;
use std::sync::Arc;

use atlaspack_core::asset_graph::{AssetGraph, DependencyState};
use atlaspack_core::types::{Asset, Dependency, FileType, Priority, Target};
use atlaspack_graph::NodeId;

/// Builds host asset graphs for tests. Asset ids are the paths passed in.
pub struct AssetGraphBuilder {
  graph: AssetGraph,
}

pub fn asset_graph_builder() -> AssetGraphBuilder {
  AssetGraphBuilder {
    graph: AssetGraph::new(),
  }
}

impl AssetGraphBuilder {
  /// Adds an asset loaded by an entry dependency with the default target.
  pub fn entry_asset(&mut self, path: &str) -> NodeId {
    self.entry_asset_with_target(path, Some(Target::default()))
  }

  pub fn entry_asset_with_target(&mut self, path: &str, target: Option<Target>) -> NodeId {
    let dependency = Dependency {
      is_entry: true,
      needs_stable_name: true,
      specifier: String::from(path),
      target: target.map(Box::new),
      ..Dependency::default()
    };
    let dependency = self.graph.add_entry_dependency(dependency);
    let asset = self.asset(path);
    self.graph.add_edge(dependency, asset).unwrap();
    asset
  }

  pub fn asset(&mut self, path: &str) -> NodeId {
    let extension = path.rsplit('.').next().unwrap_or_default();
    self.asset_with_type(path, FileType::from_extension(extension))
  }

  pub fn asset_with_type(&mut self, path: &str, file_type: FileType) -> NodeId {
    self.graph.add_asset(Arc::new(Asset {
      id: String::from(path),
      file_path: PathBuf::from(path),
      file_type,
    }))
  }

  pub fn sync_dependency(&mut self, source: NodeId, target: NodeId) -> NodeId {
    self.dependency(source, target, Priority::Sync)
  }

  pub fn async_dependency(&mut self, source: NodeId, target: NodeId) -> NodeId {
    self.dependency(source, target, Priority::Lazy)
  }

  pub fn parallel_dependency(&mut self, source: NodeId, target: NodeId) -> NodeId {
    self.dependency(source, target, Priority::Parallel)
  }

  /// Adds a dependency that was excluded upstream.
  pub fn skipped_dependency(&mut self, source: NodeId, target: NodeId) -> NodeId {
    let dependency = self.sync_dependency(source, target);
    self
      .graph
      .set_dependency_state(dependency, DependencyState::Excluded)
      .unwrap();
    dependency
  }

  pub fn dependency(&mut self, source: NodeId, target: NodeId, priority: Priority) -> NodeId {
    let source_asset_id = self.graph.get_asset(source).unwrap().id.clone();
    let target_path = self.graph.get_asset(target).unwrap().id.clone();

    let dependency = self.graph.add_dependency(Dependency::new(
      format!("./{target_path}"),
      source_asset_id,
      priority,
    ));
    self.graph.add_edge(source, dependency).unwrap();
    self.graph.add_edge(dependency, target).unwrap();
    dependency
  }

  pub fn build(self) -> AssetGraph {
    self.graph
  }
}

/// Node id of the asset with the given path.
pub fn asset_node(graph: &AssetGraph, path: &str) -> NodeId {
  graph
    .get_node_id_by_content_key(path)
    .unwrap_or_else(|| panic!("no asset {path}"))
}

/// Paths of the given asset nodes.
pub fn asset_paths(graph: &AssetGraph, assets: impl IntoIterator<Item = NodeId>) -> Vec<String> {
  assets
    .into_iter()
    .map(|node_id| graph.get_asset(node_id).unwrap().id.clone())
    .collect()
}
