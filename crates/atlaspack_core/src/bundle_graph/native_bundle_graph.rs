use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use atlaspack_graph::NodeId;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use crate::asset_graph::{AssetGraph, AssetGraphNode};
use crate::hash::hash_string;
use crate::types::{Asset, Bundle, Dependency, Target};

use super::{BundleGroupId, BundleId, BundleRole, CreateBundleOptions, MutableBundleGraph};

/// Edge types in the native bundle graph.
///
/// Numeric values match the JS bundle graph edge types.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum NativeBundleGraphEdgeType {
  #[default]
  Null = 1,
  Contains = 2,
  Bundle = 3,
  References = 4,
  InternalAsync = 5,
}

#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum NativeBundleGraphNode {
  Root,
  Asset(Arc<Asset>),
  Dependency(Arc<Dependency>),
  BundleGroup {
    target: Target,
    entry_asset_id: String,
  },
  Bundle(Bundle),
}

/// PetGraph-backed bundle graph built on top of an [`AssetGraph`].
///
/// Asset and dependency nodes are copied from the asset graph with `Null` edges; bundles and
/// bundle groups are added by the bundler through [`MutableBundleGraph`].
#[derive(Clone, Debug)]
pub struct NativeBundleGraph {
  asset_graph: AssetGraph,
  graph: StableDiGraph<NativeBundleGraphNode, NativeBundleGraphEdgeType>,
  root: NodeIndex,
  node_index_by_asset_graph_node: HashMap<NodeId, NodeIndex>,
  bundles: Vec<NodeIndex>,
  bundle_groups: Vec<NodeIndex>,
  bundle_group_by_key: HashMap<(String, NodeId), BundleGroupId>,

  /// Maps full asset IDs to concise public IDs.
  pub public_id_by_asset_id: HashMap<String, String>,
  /// Set of all assigned asset public IDs.
  pub asset_public_ids: HashSet<String>,
  /// Set of all assigned bundle public IDs.
  pub bundle_public_ids: HashSet<String>,
}

impl NativeBundleGraph {
  /// Create a bundle graph from an asset graph.
  ///
  /// Copies all asset/dependency/root nodes and all edges from the asset graph.
  pub fn from_asset_graph(asset_graph: AssetGraph) -> Self {
    let mut graph = StableDiGraph::new();
    let root = graph.add_node(NativeBundleGraphNode::Root);
    let mut node_index_by_asset_graph_node = HashMap::new();

    for (node_id, node) in asset_graph.graph().nodes() {
      let node_index = match node {
        AssetGraphNode::Root => root,
        AssetGraphNode::Asset(asset) => graph.add_node(NativeBundleGraphNode::Asset(asset.clone())),
        AssetGraphNode::Dependency(dependency_node) => graph.add_node(
          NativeBundleGraphNode::Dependency(dependency_node.dependency.clone()),
        ),
      };
      node_index_by_asset_graph_node.insert(node_id, node_index);
    }

    for (from, to) in asset_graph.graph().edges() {
      let (Some(from), Some(to)) = (
        node_index_by_asset_graph_node.get(&from),
        node_index_by_asset_graph_node.get(&to),
      ) else {
        continue;
      };
      graph.add_edge(*from, *to, NativeBundleGraphEdgeType::Null);
    }

    let mut public_id_by_asset_id = HashMap::new();
    let mut asset_public_ids = HashSet::new();
    for (_, asset) in asset_graph.assets() {
      let public_id = generate_public_id(&asset.id, |candidate| {
        asset_public_ids.contains(candidate)
      });
      asset_public_ids.insert(public_id.clone());
      public_id_by_asset_id.insert(asset.id.clone(), public_id);
    }

    NativeBundleGraph {
      asset_graph,
      graph,
      root,
      node_index_by_asset_graph_node,
      bundles: Vec::new(),
      bundle_groups: Vec::new(),
      bundle_group_by_key: HashMap::new(),
      public_id_by_asset_id,
      asset_public_ids,
      bundle_public_ids: HashSet::new(),
    }
  }

  pub fn graph(&self) -> &StableDiGraph<NativeBundleGraphNode, NativeBundleGraphEdgeType> {
    &self.graph
  }

  pub fn root_node(&self) -> NodeIndex {
    self.root
  }

  /// Bundles in creation order.
  pub fn get_bundles(&self) -> Vec<&Bundle> {
    self
      .bundles
      .iter()
      .filter_map(|node_index| match self.graph.node_weight(*node_index) {
        Some(NativeBundleGraphNode::Bundle(bundle)) => Some(bundle),
        _ => None,
      })
      .collect()
  }

  pub fn get_bundle(&self, bundle_id: BundleId) -> Option<&Bundle> {
    let node_index = self.bundles.get(bundle_id.0)?;
    match self.graph.node_weight(*node_index)? {
      NativeBundleGraphNode::Bundle(bundle) => Some(bundle),
      _ => None,
    }
  }

  /// Assets contained in a bundle, in asset graph order.
  pub fn get_bundle_assets(&self, bundle_id: BundleId) -> Vec<&Arc<Asset>> {
    let Some(node_index) = self.bundles.get(bundle_id.0) else {
      return Vec::new();
    };

    let mut contained = self
      .outgoing(*node_index, NativeBundleGraphEdgeType::Contains)
      .collect::<Vec<_>>();
    contained.sort();

    contained
      .into_iter()
      .filter_map(|node_index| match self.graph.node_weight(node_index) {
        Some(NativeBundleGraphNode::Asset(asset)) => Some(asset),
        _ => None,
      })
      .collect()
  }

  pub fn bundle_group_count(&self) -> usize {
    self.bundle_groups.len()
  }

  /// The target and entry asset id of a bundle group.
  pub fn get_bundle_group(&self, bundle_group_id: BundleGroupId) -> Option<(&Target, &str)> {
    let node_index = self.bundle_groups.get(bundle_group_id.0)?;
    match self.graph.node_weight(*node_index)? {
      NativeBundleGraphNode::BundleGroup {
        target,
        entry_asset_id,
      } => Some((target, entry_asset_id.as_str())),
      _ => None,
    }
  }

  /// Bundles loaded by a bundle group, in bundle creation order.
  pub fn get_bundles_in_bundle_group(&self, bundle_group_id: BundleGroupId) -> Vec<&Bundle> {
    let Some(node_index) = self.bundle_groups.get(bundle_group_id.0) else {
      return Vec::new();
    };

    let mut bundles = self
      .outgoing(*node_index, NativeBundleGraphEdgeType::Bundle)
      .collect::<Vec<_>>();
    bundles.sort();

    bundles
      .into_iter()
      .filter_map(|node_index| match self.graph.node_weight(node_index) {
        Some(NativeBundleGraphNode::Bundle(bundle)) => Some(bundle),
        _ => None,
      })
      .collect()
  }

  pub fn is_dependency_internalized(&self, bundle_id: BundleId, dependency: NodeId) -> bool {
    let (Some(bundle), Some(dependency)) = (
      self.bundles.get(bundle_id.0),
      self.node_index_by_asset_graph_node.get(&dependency),
    ) else {
      return false;
    };

    self
      .outgoing(*bundle, NativeBundleGraphEdgeType::InternalAsync)
      .any(|node_index| node_index == *dependency)
  }

  /// The bundle group a dependency loads, if one was created for it.
  pub fn get_bundle_group_for_dependency(&self, dependency: NodeId) -> Option<BundleGroupId> {
    let dependency = self.node_index_by_asset_graph_node.get(&dependency)?;

    self
      .outgoing(*dependency, NativeBundleGraphEdgeType::Null)
      .find_map(|node_index| {
        self
          .bundle_groups
          .iter()
          .position(|bundle_group| *bundle_group == node_index)
      })
      .map(BundleGroupId)
  }

  fn outgoing(
    &self,
    node_index: NodeIndex,
    edge_type: NativeBundleGraphEdgeType,
  ) -> impl Iterator<Item = NodeIndex> + '_ {
    self
      .graph
      .edges_directed(node_index, Direction::Outgoing)
      .filter(move |edge| *edge.weight() == edge_type)
      .map(|edge| edge.target())
  }

  fn add_edge_once(
    &mut self,
    from: NodeIndex,
    to: NodeIndex,
    edge_type: NativeBundleGraphEdgeType,
  ) {
    let exists = self
      .graph
      .edges_connecting(from, to)
      .any(|edge| *edge.weight() == edge_type);

    if !exists {
      self.graph.add_edge(from, to, edge_type);
    }
  }

  fn node_index(&self, node_id: NodeId) -> anyhow::Result<NodeIndex> {
    self
      .node_index_by_asset_graph_node
      .get(&node_id)
      .copied()
      .ok_or_else(|| anyhow!("Node {node_id} is not part of the asset graph"))
  }

  fn bundle_node_index(&self, bundle_id: BundleId) -> anyhow::Result<NodeIndex> {
    self
      .bundles
      .get(bundle_id.0)
      .copied()
      .ok_or_else(|| anyhow!("Unknown bundle {}", bundle_id.0))
  }
}

impl MutableBundleGraph for NativeBundleGraph {
  fn asset_graph(&self) -> &AssetGraph {
    &self.asset_graph
  }

  fn create_bundle(&mut self, options: CreateBundleOptions) -> anyhow::Result<BundleId> {
    let entry_asset = match options.entry_asset {
      Some(node_id) => Some(
        self
          .asset_graph
          .get_asset(node_id)
          .cloned()
          .with_context(|| format!("Bundle entry {node_id} is not an asset"))?,
      ),
      None => None,
    };

    let key = entry_asset
      .as_ref()
      .map(|asset| asset.id.clone())
      .or_else(|| options.unique_key.clone())
      .ok_or_else(|| anyhow!("Bundles without an entry asset need a unique key"))?;

    let id = hash_string(format!(
      "bundle:{}{}",
      key,
      options.target.dist_dir.display()
    ));

    let name = bundle_name(&id, entry_asset.as_deref(), &options);
    let public_id = generate_public_id(&id, |candidate| {
      self.bundle_public_ids.contains(candidate)
    });
    self.bundle_public_ids.insert(public_id.clone());

    let entry_asset_ids = entry_asset
      .iter()
      .map(|asset| asset.id.clone())
      .collect::<Vec<_>>();

    let bundle = Bundle {
      id,
      public_id: Some(public_id),
      bundle_type: options.bundle_type,
      main_entry_id: entry_asset_ids.first().cloned(),
      entry_asset_ids,
      name: Some(name),
      needs_stable_name: options.needs_stable_name,
      is_splittable: options.role != BundleRole::Entry,
      target: options.target,
    };

    debug!(bundle = ?bundle.name, role = ?options.role, "Created bundle");

    let node_index = self.graph.add_node(NativeBundleGraphNode::Bundle(bundle));
    self.bundles.push(node_index);

    Ok(BundleId(self.bundles.len() - 1))
  }

  fn add_asset_to_bundle(&mut self, asset: NodeId, bundle: BundleId) -> anyhow::Result<()> {
    if self.asset_graph.get_asset(asset).is_none() {
      return Err(anyhow!("Node {asset} is not an asset"));
    }

    let bundle = self.bundle_node_index(bundle)?;
    let asset = self.node_index(asset)?;
    self.add_edge_once(bundle, asset, NativeBundleGraphEdgeType::Contains);

    Ok(())
  }

  fn internalize_async_dependency(
    &mut self,
    bundle: BundleId,
    dependency: NodeId,
  ) -> anyhow::Result<()> {
    let is_async = self
      .asset_graph
      .get_dependency(dependency)
      .map(|dependency| dependency.priority.is_async())
      .with_context(|| format!("Node {dependency} is not a dependency"))?;

    if !is_async {
      return Err(anyhow!(
        "Dependency {dependency} is not async and cannot be internalized"
      ));
    }

    let bundle = self.bundle_node_index(bundle)?;
    let dependency = self.node_index(dependency)?;
    self.add_edge_once(bundle, dependency, NativeBundleGraphEdgeType::InternalAsync);

    Ok(())
  }

  fn create_bundle_group(
    &mut self,
    dependency: NodeId,
    target: &Target,
  ) -> anyhow::Result<BundleGroupId> {
    let is_entry = self
      .asset_graph
      .get_dependency(dependency)
      .map(|dependency| dependency.is_entry_dependency())
      .with_context(|| format!("Node {dependency} is not a dependency"))?;

    let resolved = self
      .asset_graph
      .resolve_dependency_asset(dependency)
      .with_context(|| format!("Dependency {dependency} did not resolve to an asset"))?;

    let key = (target.name.clone(), resolved);
    let bundle_group_id = match self.bundle_group_by_key.get(&key) {
      Some(bundle_group_id) => *bundle_group_id,
      None => {
        let entry_asset_id = self
          .asset_graph
          .get_asset(resolved)
          .map(|asset| asset.id.clone())
          .unwrap_or_default();

        let node_index = self.graph.add_node(NativeBundleGraphNode::BundleGroup {
          target: target.clone(),
          entry_asset_id,
        });
        self.bundle_groups.push(node_index);

        let bundle_group_id = BundleGroupId(self.bundle_groups.len() - 1);
        self.bundle_group_by_key.insert(key, bundle_group_id);
        bundle_group_id
      }
    };

    let bundle_group = self.bundle_groups[bundle_group_id.0];
    let dependency = self.node_index(dependency)?;
    self.add_edge_once(dependency, bundle_group, NativeBundleGraphEdgeType::Null);
    if is_entry {
      self.add_edge_once(self.root, bundle_group, NativeBundleGraphEdgeType::Null);
    }

    Ok(bundle_group_id)
  }

  fn add_bundle_to_bundle_group(
    &mut self,
    bundle: BundleId,
    bundle_group: BundleGroupId,
  ) -> anyhow::Result<()> {
    let bundle = self.bundle_node_index(bundle)?;
    let bundle_group = self
      .bundle_groups
      .get(bundle_group.0)
      .copied()
      .ok_or_else(|| anyhow!("Unknown bundle group {}", bundle_group.0))?;

    self.add_edge_once(bundle_group, bundle, NativeBundleGraphEdgeType::Bundle);
    Ok(())
  }
}

fn bundle_name(id: &str, entry_asset: Option<&Asset>, options: &CreateBundleOptions) -> String {
  let extension = options.bundle_type.extension();

  if options.needs_stable_name {
    if let Some(dist_entry) = &options.target.dist_entry {
      return dist_entry.to_string_lossy().to_string();
    }
  }

  let file_name = entry_asset
    .and_then(|asset| asset.file_stem())
    .unwrap_or_else(|| String::from("bundle"));

  if options.needs_stable_name {
    return format!("{}.{}", file_name, extension);
  }

  match options.role {
    BundleRole::Shared => format!("shared.{}.{}", &id[..8.min(id.len())], extension),
    role => format!(
      "{}{}.{}.{}",
      role.name_prefix(),
      file_name,
      &id[..8.min(id.len())],
      extension
    ),
  }
}

const BASE62_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn base62_encode(bytes: &[u8]) -> String {
  if bytes.is_empty() {
    return String::new();
  }

  // 16 bytes fill the accumulator
  let mut num = bytes
    .iter()
    .take(16)
    .fold(0u128, |acc, &b| acc * 256 + b as u128);
  if num == 0 {
    return "0".to_string();
  }

  let mut result = Vec::new();
  while num > 0 {
    let remainder = (num % 62) as usize;
    result.push(BASE62_ALPHABET[remainder]);
    num /= 62;
  }

  result.reverse();
  String::from_utf8(result).unwrap_or_default()
}

fn hex_bytes(id: &str) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(id.len() / 2);
  let mut i = 0;
  while i + 1 < id.len() {
    if let Some(Ok(b)) = id.get(i..i + 2).map(|pair| u8::from_str_radix(pair, 16)) {
      bytes.push(b);
    }
    i += 2;
  }
  bytes
}

/// Shortest prefix (at least 5 characters) of the base62 form of `id` that is not taken yet.
///
/// Ids that are not hex encoded are hashed first. When every prefix is taken a numeric suffix is
/// appended.
pub fn generate_public_id<F>(id: &str, already_exists: F) -> String
where
  F: Fn(&str) -> bool,
{
  let mut encoded = base62_encode(&hex_bytes(id));
  if encoded.len() < 5 {
    encoded = base62_encode(&hex_bytes(&hash_string(id.to_string())));
  }

  for end in 5..=encoded.len() {
    let candidate = &encoded[..end];
    if !already_exists(candidate) {
      return candidate.to_string();
    }
  }

  (1..)
    .map(|suffix: u32| format!("{encoded}{suffix}"))
    .find(|candidate| !already_exists(candidate))
    .unwrap_or(encoded)
}
