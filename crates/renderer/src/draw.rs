//! Command recording for the main pass.
//!
//! # Draw protocol
//!
//! For every item of a layer, in order:
//!
//! 1. bind the mesh's vertex and index buffers
//! 2. set the primitive topology
//! 3. bind the object record at `objects.base + item.constant_slot * stride`
//! 4. bind the material record at `materials.base + material.constant_slot * stride`
//! 5. bind the material's texture, if it has one
//! 6. draw `index_count` indices from `start_index`, offset by
//!    `base_vertex`, one instance

use renderer_rhi::{CommandList, DrawIndexed, MappedBuffer, PipelineHandle};
use tracing::{debug, trace};

use crate::frame_resource::FrameBindings;
use crate::registry::RenderLayer;
use crate::scene::Scene;

/// Pipeline bound for each layer. Pipelines are created outside the
/// renderer; a layer without one is not drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerPipelines {
    pipelines: [Option<PipelineHandle>; RenderLayer::COUNT],
}

impl LayerPipelines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, layer: RenderLayer, pipeline: PipelineHandle) -> Self {
        self.set(layer, Some(pipeline));
        self
    }

    pub fn set(&mut self, layer: RenderLayer, pipeline: Option<PipelineHandle>) {
        self.pipelines[layer.index()] = pipeline;
    }

    #[inline]
    pub fn get(&self, layer: RenderLayer) -> Option<PipelineHandle> {
        self.pipelines[layer.index()]
    }
}

/// Records draws for every item of `layer`.
///
/// # Returns
///
/// The number of draw calls recorded.
pub fn draw_render_items<L, Buf>(
    commands: &mut L,
    scene: &Scene<Buf>,
    layer: RenderLayer,
    bindings: &FrameBindings<'_, Buf>,
) -> u32
where
    L: CommandList,
    Buf: MappedBuffer,
{
    let registry = scene.registry();
    let mut draws = 0;

    for &id in registry.items_in_layer(layer) {
        let item = registry.item(id);
        let mesh = scene.mesh(item.mesh());
        let material = scene.material(item.material());
        let submesh = item.submesh();

        commands.set_geometry(&mesh.binding(bindings.frame_vertices));
        commands.set_topology(item.topology());
        commands.set_object_constants(
            bindings
                .object_constants
                .record_address(item.constant_slot()),
        );
        commands.set_material_constants(
            bindings
                .material_constants
                .record_address(material.constant_slot()),
        );
        if let Some(texture) = material.diffuse_texture() {
            commands.set_texture(texture);
        }
        commands.draw_indexed(DrawIndexed {
            index_count: submesh.index_count,
            instance_count: 1,
            start_index: submesh.start_index,
            base_vertex: submesh.base_vertex,
            start_instance: 0,
        });
        draws += 1;
    }

    draws
}

/// Records the main pass: clears to `clear_color`, binds the pass
/// constants, then draws each layer with its pipeline in draw order.
///
/// # Returns
///
/// The number of draw calls recorded.
pub fn record_main_pass<L, Buf>(
    commands: &mut L,
    scene: &Scene<Buf>,
    pipelines: &LayerPipelines,
    bindings: &FrameBindings<'_, Buf>,
    clear_color: [f32; 4],
) -> u32
where
    L: CommandList,
    Buf: MappedBuffer,
{
    commands.begin_pass(clear_color);
    commands.set_pass_constants(bindings.pass_constants);

    let mut draws = 0;
    for layer in RenderLayer::ALL {
        let items = scene.registry().items_in_layer(layer);
        if items.is_empty() {
            continue;
        }
        let Some(pipeline) = pipelines.get(layer) else {
            debug!(
                "Skipping {} layer ({} items): no pipeline",
                layer.name(),
                items.len()
            );
            continue;
        };

        commands.bind_pipeline(pipeline);
        let layer_draws = draw_render_items(commands, scene, layer, bindings);
        trace!("{} layer: {} draws", layer.name(), layer_draws);
        draws += layer_draws;
    }

    commands.end_pass();
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use renderer_resources::{MaterialDesc, MeshGeometry, ObjectConstants, SubmeshGeometry};
    use renderer_rhi::{
        Backend, BufferUsage, Command, Completion, GpuAddress, HeadlessBackend, HeadlessBuffer,
        IndexFormat, PrimitiveTopology, TextureSlot,
    };

    use crate::scene::{RenderItemDesc, SceneBuilder};
    use crate::upload_buffer::UploadBuffer;

    struct Fixture {
        backend: HeadlessBackend,
        scene: Scene<HeadlessBuffer>,
        objects: UploadBuffer<HeadlessBuffer, ObjectConstants>,
        materials: UploadBuffer<HeadlessBuffer, renderer_resources::MaterialConstants>,
    }

    fn fixture() -> Fixture {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let vb = backend
            .create_static_buffer(BufferUsage::Vertex, &[0; 1024], "vb")
            .unwrap();
        let ib = backend
            .create_static_buffer(BufferUsage::Index, &[0; 128], "ib")
            .unwrap();
        let mut mesh = MeshGeometry::new("shapes", vb, 32, ib, IndexFormat::U16);
        mesh.add_submesh("box", SubmeshGeometry::whole(36));
        mesh.add_submesh(
            "grid",
            SubmeshGeometry {
                index_count: 24,
                start_index: 36,
                base_vertex: 24,
            },
        );

        let mut builder = SceneBuilder::new(3);
        let shapes = builder.add_mesh(mesh).unwrap();
        let plain = builder.add_material(MaterialDesc::new("plain")).unwrap();
        let wire = builder
            .add_material(MaterialDesc::new("wire").with_texture(TextureSlot(4)))
            .unwrap();
        builder
            .add_render_item(RenderItemDesc::new(shapes, "grid", plain))
            .unwrap();
        builder
            .add_render_item(
                RenderItemDesc::new(shapes, "box", wire)
                    .with_layer(RenderLayer::AlphaTested)
                    .with_world(Mat4::from_translation(glam::Vec3::Y)),
            )
            .unwrap();
        builder
            .add_render_item(
                RenderItemDesc::new(shapes, "box", plain)
                    .with_layer(RenderLayer::Transparent)
                    .with_topology(PrimitiveTopology::LineList),
            )
            .unwrap();
        let scene = builder.build().unwrap();

        let objects = UploadBuffer::constants(&backend, 3, "objects").unwrap();
        let materials = UploadBuffer::constants(&backend, 2, "materials").unwrap();
        Fixture {
            backend,
            scene,
            objects,
            materials,
        }
    }

    fn bindings(f: &Fixture) -> FrameBindings<'_, HeadlessBuffer> {
        FrameBindings {
            pass_constants: GpuAddress(0xdead_0000),
            object_constants: &f.objects,
            material_constants: &f.materials,
            frame_vertices: None,
        }
    }

    fn recording(f: &Fixture) -> renderer_rhi::HeadlessCommandList {
        let mut commands = f.backend.create_command_list().unwrap();
        commands.reset().unwrap();
        commands
    }

    #[test]
    fn test_draw_protocol_per_item() {
        let f = fixture();
        let mut commands = recording(&f);

        let draws = draw_render_items(&mut commands, &f.scene, RenderLayer::AlphaTested, &bindings(&f));
        assert_eq!(draws, 1);

        let mesh = f.scene.mesh(f.scene.mesh_id("shapes").unwrap());
        let object_base = f.objects.base_address().raw();
        let material_base = f.materials.base_address().raw();
        assert_eq!(
            commands.commands(),
            &[
                Command::SetGeometry(mesh.binding(None)),
                Command::SetTopology(PrimitiveTopology::TriangleList),
                Command::SetObjectConstants(GpuAddress(object_base + 256)),
                Command::SetMaterialConstants(GpuAddress(material_base + 256)),
                Command::SetTexture(TextureSlot(4)),
                Command::DrawIndexed(DrawIndexed {
                    index_count: 36,
                    instance_count: 1,
                    start_index: 0,
                    base_vertex: 0,
                    start_instance: 0,
                }),
            ]
        );
    }

    #[test]
    fn test_untextured_item_binds_no_texture() {
        let f = fixture();
        let mut commands = recording(&f);
        draw_render_items(&mut commands, &f.scene, RenderLayer::Opaque, &bindings(&f));

        assert!(
            !commands
                .commands()
                .iter()
                .any(|c| matches!(c, Command::SetTexture(_)))
        );
        assert!(commands.commands().contains(&Command::DrawIndexed(DrawIndexed {
            index_count: 24,
            instance_count: 1,
            start_index: 36,
            base_vertex: 24,
            start_instance: 0,
        })));
    }

    #[test]
    fn test_main_pass_layer_order() {
        let f = fixture();
        let mut commands = recording(&f);
        let pipelines = LayerPipelines::new()
            .with(RenderLayer::Opaque, PipelineHandle(1))
            .with(RenderLayer::AlphaTested, PipelineHandle(2))
            .with(RenderLayer::Transparent, PipelineHandle(4));

        let draws = record_main_pass(&mut commands, &f.scene, &pipelines, &bindings(&f), [0.7; 4]);
        assert_eq!(draws, 3);

        let log = commands.commands();
        assert_eq!(log[0], Command::BeginPass { clear_color: [0.7; 4] });
        assert_eq!(log[1], Command::SetPassConstants(GpuAddress(0xdead_0000)));
        assert_eq!(log.last(), Some(&Command::EndPass));

        let bound: Vec<_> = log
            .iter()
            .filter_map(|c| match c {
                Command::BindPipeline(p) => Some(p.0),
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![1, 2, 4]);
    }

    #[test]
    fn test_layer_without_pipeline_is_skipped() {
        let f = fixture();
        let mut commands = recording(&f);
        let pipelines = LayerPipelines::new().with(RenderLayer::Opaque, PipelineHandle(1));

        let draws = record_main_pass(&mut commands, &f.scene, &pipelines, &bindings(&f), [0.0; 4]);
        assert_eq!(draws, 1);
    }
}
