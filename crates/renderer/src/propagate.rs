//! Dirty-tracking constant propagation.
//!
//! Each frame resource holds its own copy of every object and material
//! record. A mutation sets the entity's dirty counter to N; every frame,
//! each dirty entity is copied into the current frame resource at its
//! constant slot and its counter is decremented. After N consecutive
//! frames every frame resource holds the new data, each written once.
//!
//! Mutating an entity again before its counter reaches zero restarts the
//! count, so a frame resource may be rewritten more than once before the
//! others catch up. The result is still correct.

use bytemuck::Pod;
use renderer_resources::{DirtyCounter, Material, MaterialConstants, ObjectConstants};
use renderer_rhi::MappedBuffer;

use crate::registry::RenderItem;
use crate::upload_buffer::UploadBuffer;

/// An entity whose constant record is kept in every frame resource.
pub trait DirtyConstants {
    type Record: Pod;

    /// Record index in the upload regions.
    fn constant_slot(&self) -> usize;

    fn dirty_mut(&mut self) -> &mut DirtyCounter;

    fn record(&self) -> Self::Record;
}

impl DirtyConstants for RenderItem {
    type Record = ObjectConstants;

    fn constant_slot(&self) -> usize {
        RenderItem::constant_slot(self)
    }

    fn dirty_mut(&mut self) -> &mut DirtyCounter {
        RenderItem::dirty_mut(self)
    }

    fn record(&self) -> ObjectConstants {
        self.to_constants()
    }
}

impl DirtyConstants for Material {
    type Record = MaterialConstants;

    fn constant_slot(&self) -> usize {
        Material::constant_slot(self)
    }

    fn dirty_mut(&mut self) -> &mut DirtyCounter {
        Material::dirty_mut(self)
    }

    fn record(&self) -> MaterialConstants {
        self.to_constants()
    }
}

/// Copies every dirty entity into `region` and decrements its counter.
///
/// Clean entities are not touched, so calling this when nothing is dirty
/// leaves `region` unchanged.
///
/// # Returns
///
/// The number of records written.
///
/// # Panics
///
/// Panics if an entity's constant slot is outside `region`.
pub fn propagate<E, Buf>(entities: &mut [E], region: &mut UploadBuffer<Buf, E::Record>) -> usize
where
    E: DirtyConstants,
    Buf: MappedBuffer,
{
    let mut written = 0;
    for entity in entities.iter_mut() {
        if !entity.dirty_mut().is_dirty() {
            continue;
        }
        region.copy_record(entity.constant_slot(), &entity.record());
        entity.dirty_mut().consume();
        written += 1;
    }
    written
}

/// Propagates render-item world and texture transforms.
pub fn update_object_constants<Buf: MappedBuffer>(
    items: &mut [RenderItem],
    region: &mut UploadBuffer<Buf, ObjectConstants>,
) -> usize {
    propagate(items, region)
}

/// Propagates material constants.
pub fn update_material_constants<Buf: MappedBuffer>(
    materials: &mut [Material],
    region: &mut UploadBuffer<Buf, MaterialConstants>,
) -> usize {
    propagate(materials, region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3, Vec4};
    use renderer_resources::{MaterialDesc, SubmeshGeometry};
    use renderer_rhi::{Completion, HeadlessBackend, HeadlessBuffer, PrimitiveTopology};

    use crate::registry::{MaterialId, MeshId, RenderLayer};

    fn item(slot: usize) -> RenderItem {
        RenderItem::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            slot,
            MaterialId(0),
            MeshId(0),
            SubmeshGeometry::whole(3),
            PrimitiveTopology::TriangleList,
            RenderLayer::Opaque,
            3,
        )
    }

    fn objects(backend: &HeadlessBackend, n: usize) -> UploadBuffer<HeadlessBuffer, ObjectConstants> {
        UploadBuffer::constants(backend, n, "objects").unwrap()
    }

    #[test]
    fn test_dirty_item_written_and_decremented() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut region = objects(&backend, 2);
        let mut items = vec![item(0), item(1)];

        assert_eq!(update_object_constants(&mut items, &mut region), 2);
        assert_eq!(items[0].dirty().remaining(), 2);
        assert_eq!(region.buffer().read::<ObjectConstants>(0), items[0].to_constants());
    }

    #[test]
    fn test_clean_items_are_skipped() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut region = objects(&backend, 1);
        let mut items = vec![item(0)];
        for _ in 0..3 {
            items[0].dirty_mut().consume();
        }

        let before = region.buffer().contents().to_vec();
        assert_eq!(update_object_constants(&mut items, &mut region), 0);
        assert_eq!(region.buffer().contents(), &before[..]);
    }

    #[test]
    fn test_remutation_restarts_count() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut region = objects(&backend, 1);
        let mut items = vec![item(0)];

        update_object_constants(&mut items, &mut region);
        update_object_constants(&mut items, &mut region);
        assert_eq!(items[0].dirty().remaining(), 1);

        items[0].set_world(Mat4::from_translation(Vec3::Y));
        assert_eq!(items[0].dirty().remaining(), 3);
        update_object_constants(&mut items, &mut region);
        assert_eq!(items[0].dirty().remaining(), 2);
    }

    #[test]
    fn test_material_propagation() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut region: UploadBuffer<_, MaterialConstants> =
            UploadBuffer::constants(&backend, 2, "materials").unwrap();
        let mut materials = vec![
            Material::new(MaterialDesc::new("a"), 0, 3),
            Material::new(
                MaterialDesc::new("b").with_albedo(Vec4::new(0.5, 0.5, 0.5, 1.0)),
                1,
                3,
            ),
        ];

        assert_eq!(update_material_constants(&mut materials, &mut region), 2);
        let record: MaterialConstants = region.buffer().read(256);
        assert_eq!(record.diffuse_albedo, Vec4::new(0.5, 0.5, 0.5, 1.0));
    }
}
