use std::{path::PathBuf, sync::Arc, time::Duration};

use atlaspack_bundling::{
  create_packages, find_asset_dominators, Bundler, DominatorBundler, DominatorBundlerOptions,
};
use atlaspack_core::{
  asset_graph::AssetGraph,
  bundle_graph::NativeBundleGraph,
  types::{Asset, Dependency, FileType, Priority, Target},
};
use atlaspack_graph::NodeId;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{prelude::SliceRandom, rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// Parameters controlling the synthetic graph shape.
///
/// The generator is layered to resemble an application:
///
/// - Layer 0: entry assets
/// - Layer 1: route modules (mostly lazy deps from entries)
/// - Layer 2: component modules (sync deps from routes)
/// - Layer 3: shared utility modules (sync deps from many components)
/// - Plus: some components import CSS (sync deps with a type change)
///
/// Extra deps are then added until the requested total is reached.
#[derive(Debug, Clone, Copy)]
struct GraphConfig {
  num_entries: usize,
  num_assets: usize,
  num_deps: usize,
  /// Fraction of entry deps that are lazy (0.0 - 1.0).
  lazy_ratio: f64,
  /// Fraction of assets that are CSS (0.0 - 1.0).
  css_ratio: f64,
  /// Fraction of non-entry assets that are routes (0.0 - 1.0).
  route_ratio: f64,
  seed: u64,
}

struct GraphGenerator {
  asset_graph: AssetGraph,
  rng: StdRng,
  dep_count: usize,
}

impl GraphGenerator {
  fn asset(&mut self, kind: &str, index: usize, file_type: FileType) -> NodeId {
    let file_path = format!("{kind}-{index}.{}", file_type.extension());
    self.asset_graph.add_asset(Arc::new(Asset {
      id: format!("{:016x}", spread_id(kind, index)),
      file_path: PathBuf::from(file_path),
      file_type,
    }))
  }

  fn entry(&mut self, index: usize) -> NodeId {
    let asset = self.asset("entry", index, FileType::Js);
    let dependency = self
      .asset_graph
      .add_entry_dependency(Dependency::entry(format!("entry-{index}.js"), Target::default()));
    self.asset_graph.add_edge(dependency, asset).unwrap();
    asset
  }

  fn dependency(&mut self, from: NodeId, to: NodeId, priority: Priority) {
    let source_asset_id = self.asset_graph.get_asset(from).unwrap().id.clone();
    let dependency = self.asset_graph.add_dependency(Dependency::new(
      format!("./{to}?n={}", self.dep_count),
      source_asset_id,
      priority,
    ));
    self.asset_graph.add_edge(from, dependency).unwrap();
    self.asset_graph.add_edge(dependency, to).unwrap();
    self.dep_count += 1;
  }

  fn pick(&mut self, pool: &[NodeId], amount: usize) -> Vec<NodeId> {
    pool
      .choose_multiple(&mut self.rng, amount.min(pool.len()))
      .copied()
      .collect()
  }
}

/// Spreads asset ids over the id space so public id generation sees realistic input.
fn spread_id(kind: &str, index: usize) -> u64 {
  let tag = kind.bytes().fold(0u64, |hash, byte| {
    hash.wrapping_mul(0x100000001b3) ^ u64::from(byte)
  });
  tag.rotate_left(17) ^ (index as u64).wrapping_mul(0x9e3779b97f4a7c15)
}

/// Generates a layered synthetic asset graph. Deterministic for a given `seed`.
fn generate_asset_graph(cfg: GraphConfig) -> AssetGraph {
  assert!(cfg.num_entries > 0, "need at least one entry");
  assert!(
    cfg.num_assets >= cfg.num_entries,
    "num_assets must include entries"
  );

  let mut generator = GraphGenerator {
    asset_graph: AssetGraph::new(),
    rng: StdRng::seed_from_u64(cfg.seed),
    dep_count: 0,
  };

  let remaining = cfg.num_assets - cfg.num_entries;
  let num_css = ((remaining as f64) * cfg.css_ratio).round() as usize;
  let num_routes = (((remaining as f64) * cfg.route_ratio).round() as usize).max(1);
  let num_utils = (((remaining as f64) * 0.15).round() as usize).max(1);
  let num_components = remaining
    .saturating_sub(num_css + num_routes + num_utils)
    .max(1);

  let entries = (0..cfg.num_entries)
    .map(|index| generator.entry(index))
    .collect::<Vec<_>>();
  let routes = (0..num_routes)
    .map(|index| generator.asset("route", index, FileType::Js))
    .collect::<Vec<_>>();
  let components = (0..num_components)
    .map(|index| generator.asset("component", index, FileType::Js))
    .collect::<Vec<_>>();
  let utils = (0..num_utils)
    .map(|index| generator.asset("util", index, FileType::Js))
    .collect::<Vec<_>>();
  let styles = (0..num_css)
    .map(|index| generator.asset("styles", index, FileType::Css))
    .collect::<Vec<_>>();

  // Entries -> routes
  for entry in &entries {
    for route in generator.pick(&routes, 5) {
      let priority = if generator.rng.gen_bool(cfg.lazy_ratio.clamp(0.0, 1.0)) {
        Priority::Lazy
      } else {
        Priority::Sync
      };
      generator.dependency(*entry, route, priority);
    }
  }

  // Routes -> components
  for route in &routes {
    for component in generator.pick(&components, 20) {
      generator.dependency(*route, component, Priority::Sync);
    }
  }

  // Components -> shared utilities
  for component in &components {
    for util in generator.pick(&utils, 3) {
      generator.dependency(*component, util, Priority::Sync);
    }
  }

  // A tenth of the components import CSS
  if !styles.is_empty() {
    let importers = ((components.len() as f64) * 0.10).round() as usize;
    for component in generator.pick(&components, importers.max(1)) {
      let imports = generator.rng.gen_range(1..=2);
      for css in generator.pick(&styles, imports) {
        generator.dependency(component, css, Priority::Sync);
      }
    }
  }

  let mut safety = 0usize;
  while generator.dep_count < cfg.num_deps && safety < cfg.num_deps.saturating_mul(2) {
    safety += 1;

    let roll: f64 = generator.rng.gen();
    let (from, to, priority) = if roll < 0.60 {
      let picked = generator.pick(&components, 2);
      match picked.as_slice() {
        [from, to] => (*from, *to, Priority::Sync),
        _ => continue,
      }
    } else if roll < 0.75 {
      let from = if generator.rng.gen_bool(0.5) {
        generator.pick(&entries, 1)[0]
      } else {
        generator.pick(&routes, 1)[0]
      };
      (from, generator.pick(&routes, 1)[0], Priority::Lazy)
    } else {
      let from = generator.pick(&components, 1)[0];
      (from, generator.pick(&utils, 1)[0], Priority::Sync)
    };

    if from != to {
      generator.dependency(from, to, priority);
    }
  }

  generator.asset_graph
}

fn apply_group_tuning(
  group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
  name: &str,
) {
  match name {
    "medium" => {
      group.measurement_time(Duration::from_secs(10));
    }
    "large" => {
      group.sample_size(15);
      group.measurement_time(Duration::from_secs(30));
    }
    _ => {}
  }
}

const CONFIGS: [(&str, usize, usize, usize); 3] = [
  ("small", 2, 100, 700),
  ("medium", 5, 1_000, 7_000),
  ("large", 10, 10_000, 70_000),
];

fn config(entries: usize, assets: usize, deps: usize) -> GraphConfig {
  GraphConfig {
    num_entries: entries,
    num_assets: assets,
    num_deps: deps,
    lazy_ratio: 0.15,
    css_ratio: 0.10,
    route_ratio: 0.05,
    seed: 42,
  }
}

fn init_tracing() {
  if std::env::var_os("RUST_LOG").is_some() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .try_init();
  }
}

fn benchmark_packages(c: &mut Criterion) {
  init_tracing();
  let mut group = c.benchmark_group("packages");
  let options = DominatorBundlerOptions::default();

  for (name, entries, assets, deps) in CONFIGS {
    apply_group_tuning(&mut group, name);
    let graph = generate_asset_graph(config(entries, assets, deps));

    group.bench_function(BenchmarkId::new("dominators", name), |b| {
      b.iter(|| black_box(find_asset_dominators(black_box(&graph), &options).unwrap()))
    });

    let dominators = find_asset_dominators(&graph, &options).unwrap();
    group.bench_function(BenchmarkId::new("create_packages", name), |b| {
      b.iter(|| black_box(create_packages(black_box(&graph), &dominators, &options).unwrap()))
    });
  }

  group.finish();
}

fn benchmark_full_bundle(c: &mut Criterion) {
  init_tracing();
  let mut group = c.benchmark_group("full_bundle");
  let bundler = DominatorBundler::default();

  for (name, entries, assets, deps) in CONFIGS {
    apply_group_tuning(&mut group, name);
    let graph = generate_asset_graph(config(entries, assets, deps));

    group.bench_function(BenchmarkId::new("bundle", name), |b| {
      b.iter(|| {
        let mut bundle_graph = NativeBundleGraph::from_asset_graph(black_box(graph.clone()));
        bundler.bundle(&mut bundle_graph).unwrap();
        black_box(bundle_graph);
      })
    });
  }

  group.finish();
}

criterion_group!(benches, benchmark_packages, benchmark_full_bundle);
criterion_main!(benches);
