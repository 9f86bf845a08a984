//! Vertex and index batching
//!
//! Geometry is staged here between state changes. Indices are generated at
//! reservation time and reference vertex slots that the caller fills right
//! after, so a batch is always drawable as one indexed triangle list.

use wgpudrv_common::Vertex;

/// Index capacity of the default batch.
pub const DEFAULT_INDEX_CAPACITY: usize = 20_000;

/// Fans need at least one index per vertex, so this many vertex slots never
/// run out before the index space does.
pub const DEFAULT_VERTEX_CAPACITY: usize = DEFAULT_INDEX_CAPACITY;

/// Number of indices a fan of `n` vertices expands to.
pub fn fan_index_count(n: usize) -> usize {
    3 * n.saturating_sub(2)
}

pub const QUAD_INDEX_COUNT: usize = 6;

/// The undrawn part of a batch, handed to the backend.
#[derive(Debug, Clone, Copy)]
pub struct DrawBatch<'a> {
    /// Vertices emitted since the last draw.
    pub vertices: &'a [Vertex],
    /// Slot of `vertices[0]` in the vertex buffer.
    pub first_vertex: u32,
    /// Absolute vertex slots.
    pub indices: &'a [u32],
    /// Offset of `indices[0]` in the index buffer.
    pub first_index: u32,
}

/// Bounded staging storage for vertices and indices.
#[derive(Debug)]
pub struct Batch {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    vertex_capacity: usize,
    index_capacity: usize,
    drawn_vertices: usize,
    drawn_indices: usize,
}

impl Batch {
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
            vertex_capacity,
            index_capacity,
            drawn_vertices: 0,
            drawn_indices: 0,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    pub fn undrawn_indices(&self) -> usize {
        self.indices.len() - self.drawn_indices
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    /// Whether `vertices` more vertices and `indices` more indices fit.
    pub fn fits(&self, vertices: usize, indices: usize) -> bool {
        self.vertices.len() + vertices <= self.vertex_capacity
            && self.indices.len() + indices <= self.index_capacity
    }

    /// Whether the geometry could fit in an empty batch.
    pub fn fits_empty(&self, vertices: usize, indices: usize) -> bool {
        vertices <= self.vertex_capacity && indices <= self.index_capacity
    }

    /// Appends triangle-list indices for a fan of `n` vertices starting at
    /// the vertex cursor. Vertex 0 is the shared apex.
    pub fn push_fan(&mut self, n: usize) {
        let base = self.vertices.len() as u32;
        for i in 1..n.saturating_sub(1) as u32 {
            self.indices
                .extend_from_slice(&[base, base + i, base + i + 1]);
        }
    }

    /// Appends the two triangles (0, 1, 2) and (2, 3, 0) of a quad.
    pub fn push_quad(&mut self) {
        let v = self.vertices.len() as u32;
        self.indices
            .extend_from_slice(&[v, v + 1, v + 2, v + 2, v + 3, v]);
    }

    /// Claims the next vertex slot. The slot starts zeroed.
    pub fn next_vertex(&mut self) -> &mut Vertex {
        if self.vertices.len() == self.vertex_capacity {
            tracing::error!(
                "Vertex emitted without a reservation, batch holds {} vertices",
                self.vertices.len()
            );
        }
        self.vertices.push(Vertex::default());
        let last = self.vertices.len() - 1;
        &mut self.vertices[last]
    }

    /// The undrawn range, if any.
    pub fn pending(&self) -> Option<DrawBatch<'_>> {
        if self.undrawn_indices() == 0 {
            return None;
        }
        Some(DrawBatch {
            vertices: &self.vertices[self.drawn_vertices..],
            first_vertex: self.drawn_vertices as u32,
            indices: &self.indices[self.drawn_indices..],
            first_index: self.drawn_indices as u32,
        })
    }

    /// Marks everything staged so far as drawn.
    pub fn mark_drawn(&mut self) {
        self.drawn_vertices = self.vertices.len();
        self.drawn_indices = self.indices.len();
    }

    /// Empties the batch; the next vertex goes to slot 0.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.drawn_vertices = 0;
        self.drawn_indices = 0;
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_CAPACITY, DEFAULT_INDEX_CAPACITY)
    }
}
