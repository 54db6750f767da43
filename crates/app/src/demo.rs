//! Demo scene: hills, rippling water, a wire-fence crate and tree sprites.

use anyhow::Result;
use bytemuck::Pod;
use glam::{Mat4, Vec2, Vec3, Vec4};
use renderer_renderer::{
    LayerPipelines, MaterialId, RenderItemDesc, RenderItemId, RenderLayer, Scene, SceneBuilder,
};
use renderer_resources::{MaterialDesc, MeshGeometry, SpriteVertex, SubmeshGeometry, Vertex};
use renderer_rhi::{
    Backend, BufferUsage, IndexFormat, PipelineHandle, PrimitiveTopology, RhiResult, TextureSlot,
};
use renderer_scene::Transform;
use tracing::debug;

use crate::ripple::Ripple;
use crate::shapes::{self, MeshData};

pub const GRASS_TEXTURE: TextureSlot = TextureSlot(0);
pub const WATER_TEXTURE: TextureSlot = TextureSlot(1);
pub const FENCE_TEXTURE: TextureSlot = TextureSlot(2);
pub const TREE_TEXTURE: TextureSlot = TextureSlot(3);

/// Crate position at rest.
pub const CRATE_POSITION: Vec3 = Vec3::new(3.0, 2.0, -9.0);

const TERRAIN_SIZE: f32 = 160.0;

/// The built scene and the handles the frame loop drives.
pub struct DemoScene<Buf> {
    pub scene: Scene<Buf>,
    pub water: Ripple,
    pub water_material: MaterialId,
    pub crate_item: RenderItemId,
}

/// Pipeline handles for a backend that does not compile real pipelines.
pub fn placeholder_pipelines() -> LayerPipelines {
    RenderLayer::ALL
        .iter()
        .enumerate()
        .fold(LayerPipelines::new(), |pipelines, (i, &layer)| {
            pipelines.with(layer, PipelineHandle(i as u32 + 1))
        })
}

/// Uploads `data` into static buffers as a mesh with one submesh named `submesh`.
fn upload_mesh<B: Backend, V: Pod>(
    backend: &B,
    name: &str,
    submesh: &str,
    data: &MeshData<V>,
    vertex_stride: u32,
) -> RhiResult<MeshGeometry<B::Buffer>> {
    let vertex_buffer = backend.create_static_buffer(
        BufferUsage::Vertex,
        bytemuck::cast_slice(&data.vertices),
        &format!("{name}/vertices"),
    )?;
    let index_buffer = backend.create_static_buffer(
        BufferUsage::Index,
        bytemuck::cast_slice(&data.indices),
        &format!("{name}/indices"),
    )?;

    let mut mesh = MeshGeometry::new(
        name,
        vertex_buffer,
        vertex_stride,
        index_buffer,
        IndexFormat::U16,
    );
    mesh.add_submesh(submesh, SubmeshGeometry::whole(data.index_count()));
    debug!(
        "Uploaded mesh '{}': {} vertices, {} indices",
        name,
        data.vertices.len(),
        data.indices.len()
    );
    Ok(mesh)
}

/// Builds the demo scene on `backend`.
///
/// # Errors
///
/// Returns an error if a buffer cannot be created or the scene fails
/// validation.
pub fn build<B: Backend>(backend: &B, frames_in_flight: usize) -> Result<DemoScene<B::Buffer>> {
    let mut builder = SceneBuilder::new(frames_in_flight);

    // Static meshes
    let hills = shapes::create_hills(TERRAIN_SIZE, TERRAIN_SIZE, 50, 50);
    let land = builder.add_mesh(upload_mesh(backend, "land", "grid", &hills, Vertex::stride())?)?;

    let crate_box = shapes::create_box(8.0, 8.0, 8.0);
    let boxes = builder.add_mesh(upload_mesh(
        backend,
        "boxes",
        "box",
        &crate_box,
        Vertex::stride(),
    )?)?;

    let sprites = shapes::scatter_sprites(24, 20.0, 45.0, Vec2::splat(20.0));
    let trees = builder.add_mesh(upload_mesh(
        backend,
        "trees",
        "points",
        &sprites,
        SpriteVertex::stride(),
    )?)?;

    // Water indices are static; its vertices are rewritten every frame.
    let water_grid = shapes::create_grid(TERRAIN_SIZE, TERRAIN_SIZE, 64, 64);
    let water_indices = backend.create_static_buffer(
        BufferUsage::Index,
        bytemuck::cast_slice(&water_grid.indices),
        "water/indices",
    )?;
    let mut water_mesh = MeshGeometry::with_frame_vertices(
        "water",
        Vertex::stride(),
        water_indices,
        IndexFormat::U16,
    );
    water_mesh.add_submesh("grid", SubmeshGeometry::whole(water_grid.index_count()));
    let water = builder.add_mesh(water_mesh)?;

    // Materials
    let grass = builder.add_material(
        MaterialDesc::new("grass")
            .with_fresnel(Vec3::splat(0.01))
            .with_roughness(0.125)
            .with_texture(GRASS_TEXTURE),
    )?;
    let water_material = builder.add_material(
        MaterialDesc::new("water")
            .with_albedo(Vec4::new(1.0, 1.0, 1.0, 0.5))
            .with_fresnel(Vec3::splat(0.1))
            .with_roughness(0.0)
            .with_texture(WATER_TEXTURE),
    )?;
    let wire_fence = builder.add_material(
        MaterialDesc::new("wirefence")
            .with_fresnel(Vec3::splat(0.02))
            .with_roughness(0.25)
            .with_texture(FENCE_TEXTURE),
    )?;
    let tree_sprites = builder.add_material(
        MaterialDesc::new("treeSprites")
            .with_fresnel(Vec3::splat(0.01))
            .with_roughness(0.125)
            .with_texture(TREE_TEXTURE),
    )?;

    // Render items
    builder.add_render_item(
        RenderItemDesc::new(land, "grid", grass).with_tex_transform(Transform::tiling(5.0, 5.0)),
    )?;
    let crate_item = builder.add_render_item(
        RenderItemDesc::new(boxes, "box", wire_fence)
            .with_layer(RenderLayer::AlphaTested)
            .with_world(Mat4::from_translation(CRATE_POSITION)),
    )?;
    builder.add_render_item(
        RenderItemDesc::new(trees, "points", tree_sprites)
            .with_layer(RenderLayer::AlphaTestedSprites)
            .with_topology(PrimitiveTopology::PointList),
    )?;
    builder.add_render_item(
        RenderItemDesc::new(water, "grid", water_material)
            .with_layer(RenderLayer::Transparent)
            .with_tex_transform(Transform::tiling(5.0, 5.0)),
    )?;

    Ok(DemoScene {
        scene: builder.build()?,
        water: Ripple::new(&water_grid),
        water_material,
        crate_item,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_renderer::DynamicGeometry;
    use renderer_rhi::{Completion, HeadlessBackend};

    #[test]
    fn test_demo_scene_layout() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let demo = build(&backend, 3).unwrap();
        let registry = demo.scene.registry();

        assert_eq!(registry.len(), 4);
        assert_eq!(demo.scene.materials().len(), 4);
        for layer in RenderLayer::ALL {
            assert_eq!(registry.items_in_layer(layer).len(), 1, "{}", layer.name());
        }

        let crate_item = registry.item(demo.crate_item);
        assert_eq!(crate_item.layer(), RenderLayer::AlphaTested);
        assert_eq!(crate_item.submesh().index_count, 36);
        assert_eq!(demo.water.vertex_count(), 64 * 64);

        let water = demo.scene.mesh_id("water").unwrap();
        assert!(demo.scene.mesh(water).uses_frame_vertices());
    }

    #[test]
    fn test_placeholder_pipelines_cover_every_layer() {
        let pipelines = placeholder_pipelines();
        for layer in RenderLayer::ALL {
            assert!(pipelines.get(layer).is_some());
        }
    }
}
