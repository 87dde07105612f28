//! Shared scene fixtures for tiling and batching tests.

use glam::{Mat4, Vec2, Vec3};

use crate::scene::{
  Model, ModelTreeNode, RenderBody, RenderGeometry, RenderMesh, Scene, VertexBuffer, VertexData,
};

/// Corner order follows the octant bits: X (bit 0), Y (bit 1), Z (bit 2).
pub const BOX_INDICES: [u32; 36] = [
  0, 2, 3, 0, 3, 1, // -z
  4, 5, 7, 4, 7, 6, // +z
  0, 4, 6, 0, 6, 2, // -x
  1, 3, 7, 1, 7, 5, // +x
  0, 1, 5, 0, 5, 4, // -y
  2, 6, 7, 2, 7, 3, // +y
];

/// 8 corners of the unit box `[0, 1]^3`, each nudged by `jitter`.
pub fn unit_box_vertices(jitter: f32) -> Vec<VertexData> {
  (0..8)
    .map(|i| {
      let corner = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
      let normal = (corner - Vec3::splat(0.5)).normalize();
      VertexData::new(corner + Vec3::splat(jitter), normal, Vec2::new(corner.x, corner.y))
    })
    .collect()
}

/// Ids created by [`add_box_node`].
#[derive(Clone, Copy, Debug)]
pub struct BoxIds {
  pub node: u64,
  pub model: u64,
  pub body: u64,
  pub mesh: u64,
  pub geometry: u64,
  pub vertex_buffer: u64,
}

/// Add a child node drawing one unit box with its own buffers.
pub fn add_box_node(
  scene: &mut Scene,
  parent: u64,
  local_transform: Mat4,
  material_id: u64,
  jitter: f32,
) -> BoxIds {
  let ids = BoxIds {
    node: scene.allocate_id(),
    model: scene.allocate_id(),
    body: scene.allocate_id(),
    mesh: scene.allocate_id(),
    geometry: scene.allocate_id(),
    vertex_buffer: scene.allocate_id(),
  };
  scene
    .insert_vertex_buffer(VertexBuffer::new(ids.vertex_buffer, unit_box_vertices(jitter)))
    .unwrap();
  scene
    .insert_render_geometry(RenderGeometry::new(ids.geometry, ids.vertex_buffer, BOX_INDICES))
    .unwrap();
  scene
    .insert_render_mesh(RenderMesh::new(ids.mesh, ids.geometry, material_id))
    .unwrap();
  scene
    .insert_render_body(RenderBody::new(ids.body).with_face_meshes([ids.mesh]))
    .unwrap();
  scene
    .insert_model(Model::new(ids.model, format!("box-{}", ids.node)).with_render_bodies([ids.body]))
    .unwrap();
  scene
    .add_child(
      parent,
      ModelTreeNode::new(ids.node, format!("node-{}", ids.node))
        .with_local_transform(local_transform)
        .with_model(ids.model),
    )
    .unwrap();
  ids
}

/// Add a child node whose model draws `bodies` unit boxes, one render body
/// each, the k-th body lifted by `2k` along Y.
pub fn add_multi_body_node(
  scene: &mut Scene,
  parent: u64,
  local_transform: Mat4,
  material_id: u64,
  bodies: usize,
) -> Vec<BoxIds> {
  let node = scene.allocate_id();
  let model = scene.allocate_id();
  let mut boxes = Vec::with_capacity(bodies);
  for k in 0..bodies {
    let [body, mesh, geometry, vertex_buffer] = [(); 4].map(|_| scene.allocate_id());
    scene
      .insert_vertex_buffer(VertexBuffer::new(vertex_buffer, unit_box_vertices(0.0)))
      .unwrap();
    scene
      .insert_render_geometry(RenderGeometry::new(geometry, vertex_buffer, BOX_INDICES))
      .unwrap();
    scene
      .insert_render_mesh(RenderMesh::new(mesh, geometry, material_id))
      .unwrap();
    let lift = Mat4::from_translation(Vec3::new(0.0, 2.0 * k as f32, 0.0));
    scene
      .insert_render_body(RenderBody::new(body).with_face_meshes([mesh]).with_matrix(lift))
      .unwrap();
    boxes.push(BoxIds {
      node,
      model,
      body,
      mesh,
      geometry,
      vertex_buffer,
    });
  }

  let body_ids: Vec<u64> = boxes.iter().map(|b| b.body).collect();
  scene
    .insert_model(Model::new(model, "bodies").with_render_bodies(body_ids))
    .unwrap();
  scene
    .add_child(
      parent,
      ModelTreeNode::new(node, format!("node-{node}"))
        .with_local_transform(local_transform)
        .with_model(model),
    )
    .unwrap();
  boxes
}

/// Root node 1 with `count` box children at `x = i * spacing`.
pub fn box_row_scene(count: usize, spacing: f32, material_id: u64) -> (Scene, Vec<BoxIds>) {
  let mut scene = Scene::new();
  scene.add_root(ModelTreeNode::new(1, "root")).unwrap();
  let boxes = (0..count)
    .map(|i| {
      let transform = Mat4::from_translation(Vec3::new(i as f32 * spacing, 0.0, 0.0));
      add_box_node(&mut scene, 1, transform, material_id, 0.0)
    })
    .collect();
  (scene, boxes)
}

/// Two unit cubes whose local vertices differ in the 7th decimal place,
/// placed with different rigid transforms.
pub fn congruent_cubes_scene() -> (Scene, [BoxIds; 2]) {
  let mut scene = Scene::new();
  scene.add_root(ModelTreeNode::new(1, "root")).unwrap();
  let a = add_box_node(
    &mut scene,
    1,
    Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
    7,
    0.0,
  );
  let b = add_box_node(
    &mut scene,
    1,
    Mat4::from_rotation_translation(
      glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
      Vec3::new(-5.0, 3.0, 0.0),
    ),
    7,
    3.0e-7,
  );
  (scene, [a, b])
}

/// Sort triangles so two scenes can be compared regardless of buffer order.
pub fn sorted_triangles(scene: &Scene) -> Vec<(u64, [[i64; 3]; 3])> {
  let quantize = |v: Vec3| [v.x, v.y, v.z].map(|c| (c * 1.0e3).round() as i64);
  let mut triangles: Vec<_> = scene
    .node_triangles()
    .unwrap()
    .into_iter()
    .map(|t| (t.tree_node_id, t.positions.map(quantize)))
    .collect();
  triangles.sort();
  triangles
}
