//! Scene construction.
//!
//! A [`SceneBuilder`] collects meshes, materials and render items, assigns
//! each material and each render item a constant slot in the order they
//! are added, resolves submesh names and validates every handle. The
//! resulting [`Scene`] has a fixed layout: materials and items may change
//! their data, never their membership.
//!
//! # Example
//!
//! ```
//! use renderer_renderer::scene::{RenderItemDesc, SceneBuilder};
//! use renderer_resources::{MaterialDesc, MeshGeometry, SubmeshGeometry};
//! use renderer_rhi::{Backend, BufferUsage, Completion, HeadlessBackend, IndexFormat};
//!
//! let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
//! let vb = backend.create_static_buffer(BufferUsage::Vertex, &[0; 96], "vb").unwrap();
//! let ib = backend.create_static_buffer(BufferUsage::Index, &[0; 6], "ib").unwrap();
//! let mut mesh = MeshGeometry::new("tri", vb, 32, ib, IndexFormat::U16);
//! mesh.add_submesh("tri", SubmeshGeometry::whole(3));
//!
//! let mut builder = SceneBuilder::new(3);
//! let mesh = builder.add_mesh(mesh).unwrap();
//! let material = builder.add_material(MaterialDesc::new("plain")).unwrap();
//! builder.add_render_item(RenderItemDesc::new(mesh, "tri", material)).unwrap();
//!
//! let scene = builder.build().unwrap();
//! assert_eq!(scene.registry().len(), 1);
//! ```

use std::collections::HashMap;

use glam::Mat4;
use renderer_resources::{Material, MaterialDesc, MeshGeometry};
use renderer_rhi::{MappedBuffer, PrimitiveTopology};
use tracing::info;

use crate::error::SceneError;
use crate::registry::{MaterialId, MeshId, RenderItem, RenderItemId, RenderItemRegistry, RenderLayer};

/// Description of a render item before it is added to a scene.
#[derive(Clone, Debug)]
pub struct RenderItemDesc {
    pub mesh: MeshId,
    pub submesh: String,
    pub material: MaterialId,
    pub layer: RenderLayer,
    pub topology: PrimitiveTopology,
    pub world: Mat4,
    pub tex_transform: Mat4,
}

impl RenderItemDesc {
    /// Opaque triangle-list item with identity transforms.
    pub fn new(mesh: MeshId, submesh: impl Into<String>, material: MaterialId) -> Self {
        Self {
            mesh,
            submesh: submesh.into(),
            material,
            layer: RenderLayer::Opaque,
            topology: PrimitiveTopology::TriangleList,
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
        }
    }

    pub fn with_layer(mut self, layer: RenderLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_world(mut self, world: impl Into<Mat4>) -> Self {
        self.world = world.into();
        self
    }

    pub fn with_tex_transform(mut self, tex_transform: impl Into<Mat4>) -> Self {
        self.tex_transform = tex_transform.into();
        self
    }
}

/// Collects and validates the contents of a [`Scene`].
pub struct SceneBuilder<Buf> {
    frames_in_flight: usize,
    meshes: Vec<MeshGeometry<Buf>>,
    mesh_names: HashMap<String, MeshId>,
    materials: Vec<Material>,
    material_names: HashMap<String, MaterialId>,
    registry: RenderItemRegistry,
}

impl<Buf: MappedBuffer> SceneBuilder<Buf> {
    /// Creates an empty builder for a renderer with `frames_in_flight`
    /// frame resources.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            meshes: Vec::new(),
            mesh_names: HashMap::new(),
            materials: Vec::new(),
            material_names: HashMap::new(),
            registry: RenderItemRegistry::default(),
        }
    }

    /// Adds a mesh.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateName`] if a mesh with the same name exists.
    pub fn add_mesh(&mut self, mesh: MeshGeometry<Buf>) -> Result<MeshId, SceneError> {
        if self.mesh_names.contains_key(mesh.name()) {
            return Err(SceneError::DuplicateName {
                kind: "mesh",
                name: mesh.name().to_string(),
            });
        }
        let id = MeshId(self.meshes.len());
        self.mesh_names.insert(mesh.name().to_string(), id);
        self.meshes.push(mesh);
        Ok(id)
    }

    /// Adds a material. Its constant slot is the number of materials added
    /// before it.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateName`] if a material with the same name exists.
    pub fn add_material(&mut self, desc: MaterialDesc) -> Result<MaterialId, SceneError> {
        if self.material_names.contains_key(&desc.name) {
            return Err(SceneError::DuplicateName {
                kind: "material",
                name: desc.name,
            });
        }
        let id = MaterialId(self.materials.len());
        self.material_names.insert(desc.name.clone(), id);
        self.materials
            .push(Material::new(desc, id.0, self.frames_in_flight));
        Ok(id)
    }

    /// Adds a render item. Its constant slot is the number of items added
    /// before it.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh or material handle is unknown or the
    /// mesh has no submesh of the given name.
    pub fn add_render_item(&mut self, desc: RenderItemDesc) -> Result<RenderItemId, SceneError> {
        let mesh = self
            .meshes
            .get(desc.mesh.0)
            .ok_or(SceneError::UnknownMesh(desc.mesh.0))?;
        let submesh = *mesh
            .submesh(&desc.submesh)
            .ok_or_else(|| SceneError::UnknownSubmesh {
                mesh: mesh.name().to_string(),
                submesh: desc.submesh.clone(),
            })?;
        if desc.material.0 >= self.materials.len() {
            return Err(SceneError::UnknownMaterial(desc.material.0));
        }

        let item = RenderItem::new(
            desc.world,
            desc.tex_transform,
            self.registry.len(),
            desc.material,
            desc.mesh,
            submesh,
            desc.topology,
            desc.layer,
            self.frames_in_flight,
        );
        Ok(self.registry.push(item))
    }

    /// Finishes the scene.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Empty`] if no render item was added.
    pub fn build(self) -> Result<Scene<Buf>, SceneError> {
        if self.registry.is_empty() {
            return Err(SceneError::Empty);
        }

        info!(
            "Scene built: {} meshes, {} materials, {} render items",
            self.meshes.len(),
            self.materials.len(),
            self.registry.len()
        );

        Ok(Scene {
            frames_in_flight: self.frames_in_flight,
            meshes: self.meshes,
            mesh_names: self.mesh_names,
            materials: self.materials,
            material_names: self.material_names,
            registry: self.registry,
        })
    }
}

/// Meshes, materials and render items of a renderer.
pub struct Scene<Buf> {
    /// Dirty counters of every item and material start at this.
    frames_in_flight: usize,
    meshes: Vec<MeshGeometry<Buf>>,
    mesh_names: HashMap<String, MeshId>,
    materials: Vec<Material>,
    material_names: HashMap<String, MaterialId>,
    registry: RenderItemRegistry,
}

impl<Buf: MappedBuffer> Scene<Buf> {
    /// Number of frame resources the scene's dirty counters were sized for.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this scene.
    #[inline]
    pub fn mesh(&self, id: MeshId) -> &MeshGeometry<Buf> {
        &self.meshes[id.0]
    }

    #[inline]
    pub fn mesh_id(&self, name: &str) -> Option<MeshId> {
        self.mesh_names.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this scene.
    #[inline]
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this scene.
    #[inline]
    pub fn material_mut(&mut self, id: MaterialId) -> &mut Material {
        &mut self.materials[id.0]
    }

    #[inline]
    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    /// Materials in constant-slot order.
    #[inline]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    #[inline]
    pub fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }

    #[inline]
    pub fn registry(&self) -> &RenderItemRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut RenderItemRegistry {
        &mut self.registry
    }

    /// Items and materials, borrowed together for constant updates.
    pub fn entities_mut(&mut self) -> (&mut [RenderItem], &mut [Material]) {
        (self.registry.items_mut(), &mut self.materials)
    }

    /// Meshes in handle order.
    #[inline]
    pub fn meshes(&self) -> &[MeshGeometry<Buf>] {
        &self.meshes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_resources::SubmeshGeometry;
    use renderer_rhi::{
        Backend, BufferUsage, Completion, HeadlessBackend, HeadlessBuffer, IndexFormat,
    };

    fn mesh(backend: &HeadlessBackend, name: &str) -> MeshGeometry<HeadlessBuffer> {
        let vb = backend
            .create_static_buffer(BufferUsage::Vertex, &[0; 256], "vb")
            .unwrap();
        let ib = backend
            .create_static_buffer(BufferUsage::Index, &[0; 72], "ib")
            .unwrap();
        let mut mesh = MeshGeometry::new(name, vb, 32, ib, IndexFormat::U16);
        mesh.add_submesh(
            "box",
            SubmeshGeometry {
                index_count: 36,
                start_index: 0,
                base_vertex: 0,
            },
        );
        mesh.add_submesh(
            "grid",
            SubmeshGeometry {
                index_count: 6,
                start_index: 36,
                base_vertex: 24,
            },
        );
        mesh
    }

    #[test]
    fn test_constant_slots_assigned_sequentially() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut builder = SceneBuilder::new(3);
        let shapes = builder.add_mesh(mesh(&backend, "shapes")).unwrap();
        let brick = builder.add_material(MaterialDesc::new("brick")).unwrap();
        let stone = builder.add_material(MaterialDesc::new("stone")).unwrap();

        let a = builder
            .add_render_item(RenderItemDesc::new(shapes, "box", stone))
            .unwrap();
        let b = builder
            .add_render_item(RenderItemDesc::new(shapes, "grid", brick))
            .unwrap();
        let scene = builder.build().unwrap();

        assert_eq!(scene.material(brick).constant_slot(), 0);
        assert_eq!(scene.material(stone).constant_slot(), 1);
        assert_eq!(scene.registry().item(a).constant_slot(), 0);
        assert_eq!(scene.registry().item(b).constant_slot(), 1);
        assert_eq!(
            *scene.registry().item(b).submesh(),
            SubmeshGeometry {
                index_count: 6,
                start_index: 36,
                base_vertex: 24
            }
        );
        assert_eq!(scene.material_id("stone"), Some(stone));
        assert_eq!(scene.mesh_id("shapes"), Some(shapes));
    }

    #[test]
    fn test_unknown_submesh_is_rejected() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut builder = SceneBuilder::new(3);
        let shapes = builder.add_mesh(mesh(&backend, "shapes")).unwrap();
        let material = builder.add_material(MaterialDesc::new("m")).unwrap();

        let err = builder
            .add_render_item(RenderItemDesc::new(shapes, "sphere", material))
            .unwrap_err();
        assert_eq!(
            err,
            SceneError::UnknownSubmesh {
                mesh: "shapes".to_string(),
                submesh: "sphere".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_handles_are_rejected() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut builder = SceneBuilder::new(3);
        let shapes = builder.add_mesh(mesh(&backend, "shapes")).unwrap();
        let material = builder.add_material(MaterialDesc::new("m")).unwrap();

        let err = builder
            .add_render_item(RenderItemDesc::new(MeshId(5), "box", material))
            .unwrap_err();
        assert_eq!(err, SceneError::UnknownMesh(5));

        let err = builder
            .add_render_item(RenderItemDesc::new(shapes, "box", MaterialId(9)))
            .unwrap_err();
        assert_eq!(err, SceneError::UnknownMaterial(9));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut builder = SceneBuilder::new(3);
        builder.add_mesh(mesh(&backend, "shapes")).unwrap();
        assert!(matches!(
            builder.add_mesh(mesh(&backend, "shapes")),
            Err(SceneError::DuplicateName { kind: "mesh", .. })
        ));

        builder.add_material(MaterialDesc::new("m")).unwrap();
        assert!(matches!(
            builder.add_material(MaterialDesc::new("m")),
            Err(SceneError::DuplicateName { kind: "material", .. })
        ));
    }

    #[test]
    fn test_empty_scene_is_rejected() {
        let builder: SceneBuilder<HeadlessBuffer> = SceneBuilder::new(3);
        assert!(matches!(builder.build(), Err(SceneError::Empty)));
    }
}
