//! Procedural meshes for the demo scene.

use glam::{Vec2, Vec3};
use renderer_resources::{SpriteVertex, Vertex};

/// CPU-side vertices and 16-bit indices of one mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshData<V> {
    pub vertices: Vec<V>,
    pub indices: Vec<u16>,
}

impl<V> MeshData<V> {
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Axis-aligned box centred on the origin, four vertices per face.
pub fn create_box(width: f32, height: f32, depth: f32) -> MeshData<Vertex> {
    let (w, h, d) = (width * 0.5, height * 0.5, depth * 0.5);

    // (normal, u axis, v axis) of each face; u x v == normal
    let faces = [
        (Vec3::NEG_Z, Vec3::X, Vec3::NEG_Y),
        (Vec3::Z, Vec3::NEG_X, Vec3::NEG_Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::NEG_X, Vec3::NEG_Z, Vec3::NEG_Y),
        (Vec3::X, Vec3::Z, Vec3::NEG_Y),
    ];
    let half = Vec3::new(w, h, d);

    let mut mesh = MeshData::default();
    for (normal, u_axis, v_axis) in faces {
        let base = mesh.vertices.len() as u16;
        for (u, v) in [(0.0, 1.0), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0)] {
            let offset = normal + u_axis * (u * 2.0 - 1.0) + v_axis * (v * 2.0 - 1.0);
            mesh.vertices
                .push(Vertex::new(offset * half, normal, Vec2::new(u, v)));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Flat `rows` x `columns` vertex grid in the XZ plane centred on the origin.
///
/// Texture coordinates span [0, 1] across the grid.
///
/// # Panics
///
/// Panics if the grid has fewer than 2 vertices along either axis or more
/// vertices than 16-bit indices can address.
pub fn create_grid(width: f32, depth: f32, rows: usize, columns: usize) -> MeshData<Vertex> {
    assert!(rows >= 2 && columns >= 2, "grid needs at least 2x2 vertices");
    assert!(
        rows * columns <= u16::MAX as usize + 1,
        "grid of {rows}x{columns} vertices exceeds 16-bit indices"
    );

    let dx = width / (columns - 1) as f32;
    let dz = depth / (rows - 1) as f32;
    let du = 1.0 / (columns - 1) as f32;
    let dv = 1.0 / (rows - 1) as f32;

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(rows * columns),
        indices: Vec::with_capacity((rows - 1) * (columns - 1) * 6),
    };

    for i in 0..rows {
        let z = depth * 0.5 - i as f32 * dz;
        for j in 0..columns {
            let x = -width * 0.5 + j as f32 * dx;
            mesh.vertices.push(Vertex::new(
                Vec3::new(x, 0.0, z),
                Vec3::Y,
                Vec2::new(j as f32 * du, i as f32 * dv),
            ));
        }
    }

    for i in 0..rows - 1 {
        for j in 0..columns - 1 {
            let a = (i * columns + j) as u16;
            let b = a + 1;
            let c = ((i + 1) * columns + j) as u16;
            let d = c + 1;
            mesh.indices.extend_from_slice(&[a, b, c, c, b, d]);
        }
    }
    mesh
}

/// Height of the rolling terrain at `(x, z)`.
pub fn hill_height(x: f32, z: f32) -> f32 {
    0.3 * (z * (0.1 * x).sin() + x * (0.1 * z).cos())
}

/// Unit normal of [`hill_height`] at `(x, z)`.
pub fn hill_normal(x: f32, z: f32) -> Vec3 {
    Vec3::new(
        -0.03 * z * (0.1 * x).cos() - 0.3 * (0.1 * z).cos(),
        1.0,
        -0.3 * (0.1 * x).sin() + 0.03 * x * (0.1 * z).sin(),
    )
    .normalize()
}

/// Grid displaced by [`hill_height`].
pub fn create_hills(width: f32, depth: f32, rows: usize, columns: usize) -> MeshData<Vertex> {
    let mut mesh = create_grid(width, depth, rows, columns);
    for vertex in &mut mesh.vertices {
        let (x, z) = (vertex.position.x, vertex.position.z);
        vertex.position.y = hill_height(x, z);
        vertex.normal = hill_normal(x, z);
    }
    mesh
}

/// Billboard centres scattered over the hills, drawn as a point list.
///
/// Placement is deterministic: a golden-angle spiral between `min_radius`
/// and `max_radius`, each point lifted to sit on the terrain.
pub fn scatter_sprites(
    count: usize,
    min_radius: f32,
    max_radius: f32,
    size: Vec2,
) -> MeshData<SpriteVertex> {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(count),
        indices: (0..count as u16).collect(),
    };
    for i in 0..count {
        let t = (i as f32 + 0.5) / count as f32;
        let radius = min_radius + (max_radius - min_radius) * t.sqrt();
        let angle = i as f32 * golden_angle;
        let (x, z) = (radius * angle.cos(), radius * angle.sin());
        // Sprites are anchored at their centre.
        let y = hill_height(x, z) + size.y * 0.5;
        mesh.vertices.push(SpriteVertex {
            center: Vec3::new(x, y, z),
            size,
        });
    }
    mesh
}
