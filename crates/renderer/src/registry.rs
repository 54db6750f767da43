//! Render items and the render-item registry.
//!
//! A [`RenderItem`] is one drawable instance: a submesh of a shared mesh, a
//! material and a transform. Items reference meshes and materials through
//! index handles into the owning [`Scene`](crate::scene::Scene), which is
//! never restructured after it is built.
//!
//! The registry groups items by [`RenderLayer`]. Layers are a closed set
//! drawn in a fixed order, so each layer is an index into an array of
//! item lists.

use glam::Mat4;
use renderer_resources::{DirtyCounter, ObjectConstants, SubmeshGeometry};
use renderer_rhi::PrimitiveTopology;

/// Render pass an item is drawn in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Opaque,
    AlphaTested,
    /// Point-list billboards expanded on the GPU.
    AlphaTestedSprites,
    Transparent,
}

impl RenderLayer {
    /// Number of layers.
    pub const COUNT: usize = 4;

    /// Every layer in draw order.
    pub const ALL: [RenderLayer; Self::COUNT] = [
        RenderLayer::Opaque,
        RenderLayer::AlphaTested,
        RenderLayer::AlphaTestedSprites,
        RenderLayer::Transparent,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderLayer::Opaque => "opaque",
            RenderLayer::AlphaTested => "alpha-tested",
            RenderLayer::AlphaTestedSprites => "alpha-tested sprites",
            RenderLayer::Transparent => "transparent",
        }
    }
}

/// Handle to a mesh of a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Handle to a material of a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

/// Handle to a render item of a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderItemId(pub(crate) usize);

impl MeshId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl MaterialId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl RenderItemId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One drawable instance.
#[derive(Clone, Debug)]
pub struct RenderItem {
    world: Mat4,
    tex_transform: Mat4,
    dirty: DirtyCounter,
    constant_slot: usize,
    material: MaterialId,
    mesh: MeshId,
    submesh: SubmeshGeometry,
    topology: PrimitiveTopology,
    layer: RenderLayer,
}

impl RenderItem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        world: Mat4,
        tex_transform: Mat4,
        constant_slot: usize,
        material: MaterialId,
        mesh: MeshId,
        submesh: SubmeshGeometry,
        topology: PrimitiveTopology,
        layer: RenderLayer,
        frames_in_flight: usize,
    ) -> Self {
        Self {
            world,
            tex_transform,
            dirty: DirtyCounter::new(frames_in_flight),
            constant_slot,
            material,
            mesh,
            submesh,
            topology,
            layer,
        }
    }

    #[inline]
    pub fn world(&self) -> Mat4 {
        self.world
    }

    #[inline]
    pub fn tex_transform(&self) -> Mat4 {
        self.tex_transform
    }

    /// Replaces the world matrix and marks every frame resource stale.
    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
        self.dirty.mark();
    }

    /// Replaces the texture transform and marks every frame resource stale.
    pub fn set_tex_transform(&mut self, tex_transform: Mat4) {
        self.tex_transform = tex_transform;
        self.dirty.mark();
    }

    /// Record index in the object upload regions. Never changes.
    #[inline]
    pub fn constant_slot(&self) -> usize {
        self.constant_slot
    }

    #[inline]
    pub fn material(&self) -> MaterialId {
        self.material
    }

    #[inline]
    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    #[inline]
    pub fn submesh(&self) -> &SubmeshGeometry {
        &self.submesh
    }

    #[inline]
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    #[inline]
    pub fn layer(&self) -> RenderLayer {
        self.layer
    }

    #[inline]
    pub fn dirty(&self) -> &DirtyCounter {
        &self.dirty
    }

    #[inline]
    pub fn dirty_mut(&mut self) -> &mut DirtyCounter {
        &mut self.dirty
    }

    /// Builds the record written to the object upload regions.
    pub fn to_constants(&self) -> ObjectConstants {
        ObjectConstants::new(self.world, self.tex_transform)
    }
}

/// Every render item of a scene, grouped by layer.
#[derive(Clone, Debug, Default)]
pub struct RenderItemRegistry {
    items: Vec<RenderItem>,
    layers: [Vec<RenderItemId>; RenderLayer::COUNT],
}

impl RenderItemRegistry {
    pub(crate) fn push(&mut self, item: RenderItem) -> RenderItemId {
        let id = RenderItemId(self.items.len());
        self.layers[item.layer.index()].push(id);
        self.items.push(item);
        id
    }

    /// Items of `layer` in insertion order.
    #[inline]
    pub fn items_in_layer(&self, layer: RenderLayer) -> &[RenderItemId] {
        &self.layers[layer.index()]
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this registry.
    #[inline]
    pub fn item(&self, id: RenderItemId) -> &RenderItem {
        &self.items[id.0]
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this registry.
    #[inline]
    pub fn item_mut(&mut self, id: RenderItemId) -> &mut RenderItem {
        &mut self.items[id.0]
    }

    #[inline]
    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    /// All items, for in-place updates. Membership cannot change.
    #[inline]
    pub fn items_mut(&mut self) -> &mut [RenderItem] {
        &mut self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
