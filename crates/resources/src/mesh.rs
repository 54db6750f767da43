//! Mesh geometry.
//!
//! A [`MeshGeometry`] owns a vertex buffer and an index buffer and names the
//! index ranges ([`SubmeshGeometry`]) that render items draw. A mesh whose
//! vertices are rewritten every frame has no vertex buffer of its own; it
//! draws from the vertex region of the current frame resource instead.

use std::collections::HashMap;

use renderer_rhi::{BufferHandle, GeometryBinding, IndexFormat, MappedBuffer};

/// Index range of one drawable part of a mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmeshGeometry {
    pub index_count: u32,
    pub start_index: u32,
    /// Added to every index before vertex fetch.
    pub base_vertex: i32,
}

impl SubmeshGeometry {
    /// Submesh spanning the first `index_count` indices.
    #[inline]
    pub fn whole(index_count: u32) -> Self {
        Self {
            index_count,
            start_index: 0,
            base_vertex: 0,
        }
    }
}

/// Vertex and index buffers plus named submeshes.
pub struct MeshGeometry<Buf> {
    name: String,
    /// `None` for meshes whose vertices live in the frame resources.
    vertex_buffer: Option<Buf>,
    index_buffer: Buf,
    vertex_stride: u32,
    index_format: IndexFormat,
    submeshes: HashMap<String, SubmeshGeometry>,
}

impl<Buf: MappedBuffer> MeshGeometry<Buf> {
    /// Creates a mesh with its own static vertex buffer.
    pub fn new(
        name: impl Into<String>,
        vertex_buffer: Buf,
        vertex_stride: u32,
        index_buffer: Buf,
        index_format: IndexFormat,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_buffer: Some(vertex_buffer),
            index_buffer,
            vertex_stride,
            index_format,
            submeshes: HashMap::new(),
        }
    }

    /// Creates a mesh whose vertices are supplied by the current frame
    /// resource each frame.
    pub fn with_frame_vertices(
        name: impl Into<String>,
        vertex_stride: u32,
        index_buffer: Buf,
        index_format: IndexFormat,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_buffer: None,
            index_buffer,
            vertex_stride,
            index_format,
            submeshes: HashMap::new(),
        }
    }

    /// Adds or replaces a named submesh.
    pub fn add_submesh(&mut self, name: impl Into<String>, submesh: SubmeshGeometry) {
        self.submeshes.insert(name.into(), submesh);
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn submesh(&self, name: &str) -> Option<&SubmeshGeometry> {
        self.submeshes.get(name)
    }

    /// Returns true if the mesh draws from per-frame vertices.
    #[inline]
    pub fn uses_frame_vertices(&self) -> bool {
        self.vertex_buffer.is_none()
    }

    #[inline]
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    /// Binding used to draw the mesh.
    ///
    /// # Arguments
    ///
    /// * `frame_vertices` - Vertex region of the current frame resource
    ///
    /// # Panics
    ///
    /// Panics if the mesh draws from per-frame vertices and
    /// `frame_vertices` is `None`.
    pub fn binding(&self, frame_vertices: Option<BufferHandle>) -> GeometryBinding {
        let vertex_buffer = match &self.vertex_buffer {
            Some(buffer) => buffer.handle(),
            None => match frame_vertices {
                Some(handle) => handle,
                None => panic!(
                    "mesh '{}' draws from frame vertices but the frame resource has none",
                    self.name
                ),
            },
        };

        GeometryBinding {
            vertex_buffer,
            vertex_stride: self.vertex_stride,
            index_buffer: self.index_buffer.handle(),
            index_format: self.index_format,
        }
    }
}
