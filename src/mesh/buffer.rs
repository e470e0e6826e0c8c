//! Shared mesh arena: flat index and per-vertex attribute arrays

use crate::core::types::{Vec2, Vec3};

/// Sentinel for vertices with no counterpart in a parent meshlet
pub const REMAP_NONE: u32 = u32::MAX;

/// Bitmask of optional per-vertex attribute arrays present in a buffer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexAttrs(pub u32);

impl VertexAttrs {
    pub const NORMAL: u32 = 1 << 0;
    pub const UV0: u32 = 1 << 1;
    pub const UV1: u32 = 1 << 2;
    pub const REMAP: u32 = 1 << 3;

    pub fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn with(self, bit: u32) -> Self {
        VertexAttrs(self.0 | bit)
    }
}

/// Growable arena owning all meshlet geometry.
///
/// Parallel arrays indexed by the same vertex index; `attrs` declares which
/// optional arrays are maintained. The arena is append-only during a build:
/// offsets handed out by the alloc methods are stable and name disjoint
/// slices.
#[derive(Default)]
pub struct MeshBuffer {
    pub attrs: VertexAttrs,
    pub indices: Vec<u32>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uv0: Vec<Vec2>,
    pub uv1: Vec<Vec2>,
    pub remap: Vec<u32>,
}

/// Bring a vector's capacity to at least `num`, or to exactly `num` when
/// `shrink` is set (growing first if the current capacity is below `num`)
fn adjust<T>(v: &mut Vec<T>, num: usize, shrink: bool) {
    if num > v.capacity() {
        if shrink {
            v.reserve_exact(num - v.len());
        } else {
            v.reserve(num - v.len());
        }
    }
    if shrink {
        v.shrink_to(num);
    }
}

impl MeshBuffer {
    pub fn new(attrs: VertexAttrs) -> Self {
        Self {
            attrs,
            ..Default::default()
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Ensure index capacity for at least `num` entries. With `shrink`,
    /// reallocate to exactly `num` instead, whether that grows or frees.
    pub fn reserve_indices(&mut self, num: usize, shrink: bool) {
        adjust(&mut self.indices, num, shrink);
    }

    /// Ensure vertex capacity for at least `num` entries in every enabled
    /// attribute array. With `shrink`, reallocate to exactly `num` instead.
    pub fn reserve_vertices(&mut self, num: usize, shrink: bool) {
        adjust(&mut self.positions, num, shrink);
        if self.attrs.has(VertexAttrs::NORMAL) {
            adjust(&mut self.normals, num, shrink);
        }
        if self.attrs.has(VertexAttrs::UV0) {
            adjust(&mut self.uv0, num, shrink);
        }
        if self.attrs.has(VertexAttrs::UV1) {
            adjust(&mut self.uv1, num, shrink);
        }
        if self.attrs.has(VertexAttrs::REMAP) {
            adjust(&mut self.remap, num, shrink);
        }
    }

    /// Release all arrays and reset capacities
    pub fn clear(&mut self) {
        self.indices = Vec::new();
        self.positions = Vec::new();
        self.normals = Vec::new();
        self.uv0 = Vec::new();
        self.uv1 = Vec::new();
        self.remap = Vec::new();
    }

    /// Append `count` zeroed indices, returning the offset of the new slice
    pub fn alloc_indices(&mut self, count: u32) -> u32 {
        let offset = self.indices.len() as u32;
        self.indices.resize(self.indices.len() + count as usize, 0);
        offset
    }

    /// Append `count` vertices to every enabled attribute array, returning
    /// the offset of the new slice. Remap entries default to `REMAP_NONE`.
    pub fn alloc_vertices(&mut self, count: u32) -> u32 {
        let offset = self.positions.len() as u32;
        let len = self.positions.len() + count as usize;
        self.positions.resize(len, Vec3::ZERO);
        if self.attrs.has(VertexAttrs::NORMAL) {
            self.normals.resize(len, Vec3::ZERO);
        }
        if self.attrs.has(VertexAttrs::UV0) {
            self.uv0.resize(len, Vec2::ZERO);
        }
        if self.attrs.has(VertexAttrs::UV1) {
            self.uv1.resize(len, Vec2::ZERO);
        }
        if self.attrs.has(VertexAttrs::REMAP) {
            self.remap.resize(len, REMAP_NONE);
        }
        offset
    }

    /// Index buffer as bytes, ready for upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Position buffer as bytes, ready for upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Normal buffer as bytes, if normals are enabled
    pub fn normal_bytes(&self) -> Option<&[u8]> {
        self.attrs
            .has(VertexAttrs::NORMAL)
            .then(|| bytemuck::cast_slice(self.normals.as_slice()))
    }

    /// Parent-remap buffer as bytes, if remap is enabled
    pub fn remap_bytes(&self) -> Option<&[u8]> {
        self.attrs
            .has(VertexAttrs::REMAP)
            .then(|| bytemuck::cast_slice(self.remap.as_slice()))
    }
}
