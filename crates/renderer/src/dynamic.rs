//! Per-frame vertex sources.
//!
//! Geometry that changes every frame (a simulated water surface, for
//! instance) cannot live in a static vertex buffer the GPU may still be
//! reading. Instead each frame resource owns a vertex region, the source
//! regenerates its vertices once per frame, and they are copied into the
//! current frame resource's region. Meshes created with
//! [`MeshGeometry::with_frame_vertices`](renderer_resources::MeshGeometry::with_frame_vertices)
//! draw from that region.

use renderer_core::FrameTime;
use renderer_resources::Vertex;
use renderer_rhi::MappedBuffer;

use crate::upload_buffer::UploadBuffer;

/// Source of vertices rewritten every frame.
pub trait DynamicGeometry {
    /// Number of vertices; fixed for the lifetime of the source.
    fn vertex_count(&self) -> usize;

    /// Advances the source to `time`.
    fn update(&mut self, time: FrameTime);

    /// Current vertices; exactly [`vertex_count`](Self::vertex_count) of them.
    fn vertices(&self) -> &[Vertex];
}

/// Copies the source's vertices into a frame resource's vertex region.
///
/// # Panics
///
/// Panics if the source has more vertices than the region holds.
pub fn upload_vertices<Buf: MappedBuffer>(
    geometry: &dyn DynamicGeometry,
    region: &mut UploadBuffer<Buf, Vertex>,
) -> usize {
    let vertices = geometry.vertices();
    for (index, vertex) in vertices.iter().enumerate() {
        region.copy_record(index, vertex);
    }
    vertices.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use renderer_rhi::{Completion, HeadlessBackend};

    struct Rising {
        vertices: Vec<Vertex>,
    }

    impl DynamicGeometry for Rising {
        fn vertex_count(&self) -> usize {
            self.vertices.len()
        }

        fn update(&mut self, time: FrameTime) {
            for v in &mut self.vertices {
                v.position.y = time.total;
            }
        }

        fn vertices(&self) -> &[Vertex] {
            &self.vertices
        }
    }

    #[test]
    fn test_upload_vertices() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut region: UploadBuffer<_, Vertex> =
            UploadBuffer::packed(&backend, 4, "vertices").unwrap();

        let mut source = Rising {
            vertices: vec![Vertex::new(Vec3::ZERO, Vec3::Y, Vec2::ZERO); 4],
        };
        source.update(FrameTime::new(3.0, 0.1));

        assert_eq!(upload_vertices(&source, &mut region), 4);
        let last: Vertex = region.buffer().read(3 * 32);
        assert_eq!(last.position.y, 3.0);
    }
}
