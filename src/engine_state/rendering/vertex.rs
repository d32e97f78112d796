//! Vertex data structures and layouts for voxel rendering.
//!
//! Every vertex is a single packed 32-bit word. The shader unpacks the chunk
//! local position and the texture atlas cell, and adds the chunk origin it
//! receives per draw.

use cgmath::Point3;

/// A vertex in the voxel rendering pipeline.
///
/// # Memory Layout
/// One `u32`, most significant byte first:
/// - `y` (8 bits), `x` (8 bits), `z` (8 bits)
/// - atlas cell `v` (4 bits), atlas cell `u` (4 bits)
///
/// Total size: 4 bytes
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex(pub u32);

impl Vertex {
    /// Packs a chunk local position and an atlas cell.
    ///
    /// # Arguments
    /// * `pos` - The position inside the chunk, each component in `0..=255`
    /// * `u` - Atlas column, `0..=15`
    /// * `v` - Atlas row, `0..=15`
    ///
    /// # Returns
    /// A new `Vertex` instance
    pub fn pack(pos: Point3<u32>, u: u32, v: u32) -> Self {
        Vertex((pos.y << 24) | (pos.x << 16) | (pos.z << 8) | (v << 4) | u)
    }

    /// Splits the packed word back into `(position, u, v)`.
    pub fn unpack(self) -> (Point3<u32>, u32, u32) {
        let word = self.0;
        let pos = Point3::new((word >> 16) & 0xff, word >> 24, (word >> 8) & 0xff);
        (pos, word & 0xf, (word >> 4) & 0xf)
    }

    /// Returns the vertex buffer layout description for the shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: packed vertex (u32)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Uint32,
            }],
        }
    }
}
