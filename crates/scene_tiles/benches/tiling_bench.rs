//! Tile construction and batching benchmarks.
//!
//! Every scene is a flat grid of unit boxes under one root, each box with its
//! own model, render mesh and buffers:
//! - **tiling**: `TileSet::build`, sequential vs rayon
//! - **batching**: catalog + planning + rewrite over a built tile tree
//! - **instancing**: the same grid with instancing enabled (every box is
//!   congruent, so one instance group takes everything)

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::{Mat4, Vec2, Vec3};
use scene_tiles::scene::{
  Model, ModelTreeNode, RenderBody, RenderGeometry, RenderMesh, VertexBuffer, VertexData,
};
use scene_tiles::{run_batched_and_instanced, BatchingConfig, Scene, TileSet, TilingConfig};

const BOX_INDICES: [u32; 36] = [
  0, 2, 3, 0, 3, 1, 4, 5, 7, 4, 7, 6, 0, 4, 6, 0, 6, 2, 1, 3, 7, 1, 7, 5, 0, 1, 5, 0, 5, 4, 2, 6,
  7, 2, 7, 3,
];

fn box_vertices() -> Vec<VertexData> {
  (0..8)
    .map(|i| {
      let corner = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
      let normal = (corner - Vec3::splat(0.5)).normalize();
      VertexData::new(corner, normal, Vec2::new(corner.x, corner.y))
    })
    .collect()
}

/// `side`³ boxes on a grid with spacing 2, materials cycling through 4 ids.
fn box_grid_scene(side: usize) -> Scene {
  let mut scene = Scene::new();
  let root = scene.allocate_id();
  scene.add_root(ModelTreeNode::new(root, "root")).unwrap();

  for x in 0..side {
    for y in 0..side {
      for z in 0..side {
        let [node, model, body, mesh, geometry, buffer] = [(); 6].map(|_| scene.allocate_id());
        scene.insert_vertex_buffer(VertexBuffer::new(buffer, box_vertices())).unwrap();
        scene
          .insert_render_geometry(RenderGeometry::new(geometry, buffer, BOX_INDICES))
          .unwrap();
        scene
          .insert_render_mesh(RenderMesh::new(mesh, geometry, ((x + y + z) % 4) as u64))
          .unwrap();
        scene
          .insert_render_body(RenderBody::new(body).with_face_meshes([mesh]))
          .unwrap();
        scene
          .insert_model(Model::new(model, "box").with_render_bodies([body]))
          .unwrap();
        let offset = Vec3::new(x as f32, y as f32, z as f32) * 2.0;
        scene
          .add_child(
            root,
            ModelTreeNode::new(node, "box")
              .with_local_transform(Mat4::from_translation(offset))
              .with_model(model),
          )
          .unwrap();
      }
    }
  }
  scene
}

fn bench_tiling(c: &mut Criterion) {
  let mut group = c.benchmark_group("tiling/build");

  for side in [4usize, 8, 16] {
    let scene = box_grid_scene(side);
    let count = side * side * side;

    for (name, parallel) in [("sequential", false), ("parallel", true)] {
      let config = TilingConfig::default().with_parallel(parallel);
      group.bench_with_input(BenchmarkId::new(name, count), &scene, |b, scene| {
        b.iter(|| black_box(TileSet::build(scene, &config).unwrap()))
      });
    }
  }

  group.finish();
}

fn bench_batching(c: &mut Criterion) {
  let mut group = c.benchmark_group("batching/run");

  for side in [4usize, 8, 16] {
    let scene = box_grid_scene(side);
    let tiles = TileSet::build(&scene, &TilingConfig::default()).unwrap();
    let count = side * side * side;

    let scenarios = [
      ("batched", BatchingConfig::default()),
      ("instanced", BatchingConfig::default().with_instanced_min_vertex_count(8)),
    ];
    for (name, config) in scenarios {
      group.bench_with_input(BenchmarkId::new(name, count), &scene, |b, scene| {
        b.iter_batched(
          || scene.clone(),
          |mut scene| {
            black_box(run_batched_and_instanced(&mut scene, tiles.tile_data(), &config).unwrap())
          },
          BatchSize::LargeInput,
        )
      });
    }
  }

  group.finish();
}

criterion_group!(benches, bench_tiling, bench_batching);
criterion_main!(benches);
