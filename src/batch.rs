// =============================================================================
// QUAD BATCHING - One indexed draw per frame, no matter how many squares
// =============================================================================
//
// The batch renderer collects every square of a frame into two CPU-side arrays:
//
//   vertices: [x, y, r, g, b,  x, y, r, g, b,  ...]   (5 floats per vertex)
//   indices:  [0, 1, 2, 1, 2, 3,  4, 5, 6, 5, 6, 7, ...]
//
// At render time both arrays are uploaded in full and drawn with ONE indexed
// draw call. N squares cost O(1) draw calls instead of O(N).
//
// FRAME PROTOCOL:
//   clear(bg) ──> add_square()* ──> render(program)
//
// The renderer never talks to the GPU directly. Every side effect goes through
// a `RenderSurface`, which keeps the graphics state explicit and lets the
// accumulator run without a device.
//
// =============================================================================

use anyhow::Result;
use glam::{UVec3, Vec2, Vec3};

use crate::math::remap;

/// Floats per vertex: vec2 position + vec3 color
pub const FLOATS_PER_VERTEX: usize = 5;
/// Vertices emitted per square
pub const VERTICES_PER_QUAD: usize = 4;
/// Indices emitted per square (two triangles)
pub const INDICES_PER_QUAD: usize = 6;

/// Triangle layout of one square, in quad-local vertex order
/// (top-left = 0, top-right = 1, bottom-left = 2, bottom-right = 3)
const QUAD_INDICES: [u32; INDICES_PER_QUAD] = [0, 1, 2, 1, 2, 3];

/// Target of the batch renderer's side effects.
///
/// The Vulkan implementation records into a frame's command buffer
/// (`backend::frame::FrameSurface`); tests use a recording fake.
pub trait RenderSurface {
    /// Opaque compiled program understood by this surface
    type Program: ?Sized;

    /// Clear the color target. Alpha is always 1.0.
    fn clear(&mut self, color: Vec3);

    /// Make `program` the active program for following draws
    fn use_program(&mut self, program: &Self::Program);

    /// Replace GPU vertex storage with `vertices`
    fn upload_vertices(&mut self, vertices: &[f32]) -> Result<()>;

    /// Replace GPU index storage with `indices`
    fn upload_indices(&mut self, indices: &[u32]) -> Result<()>;

    /// Submit one indexed triangle-list draw of `index_count` indices
    fn draw_indexed(&mut self, index_count: u32);
}

/// Map an 8-bit color channel onto [0, 1].
///
/// Values outside [0, 255] are passed through, so they land outside [0, 1].
pub fn normalize_channel(channel: u32) -> f32 {
    remap(0.0, 255.0, 0.0, 1.0, channel as f32)
}

/// Per-frame geometry accumulator for colored squares
#[derive(Debug, Default)]
pub struct BatchRenderer {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    shape_count: u32,
}

impl BatchRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: drop last frame's geometry and clear the target.
    pub fn clear<S: RenderSurface>(&mut self, surface: &mut S, background: Vec3) {
        self.vertices.clear();
        self.indices.clear();
        self.shape_count = 0;

        surface.clear(background);
    }

    /// Append a square anchored at its top-left corner.
    ///
    /// `position` is in NDC (Y up), `color` is 8 bits per channel and `size`
    /// is the edge length in NDC units. Nothing is validated: a negative size
    /// flips the square, out-of-range channels stay out of range.
    pub fn add_square(&mut self, position: Vec2, color: UVec3, size: f32) {
        let color = Vec3::new(
            normalize_channel(color.x),
            normalize_channel(color.y),
            normalize_channel(color.z),
        );

        // top left, top right, bottom left, bottom right
        self.push_vertex(Vec2::new(position.x, position.y), color);
        self.push_vertex(Vec2::new(position.x + size, position.y), color);
        self.push_vertex(Vec2::new(position.x, position.y - size), color);
        self.push_vertex(Vec2::new(position.x + size, position.y - size), color);

        let base = self.shape_count * VERTICES_PER_QUAD as u32;
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));

        self.shape_count += 1;
    }

    /// Upload everything accumulated since the last `clear` and draw it once.
    ///
    /// Always issues exactly one draw, even for an empty batch.
    pub fn render<S: RenderSurface>(&self, surface: &mut S, program: &S::Program) -> Result<()> {
        surface.use_program(program);

        surface.upload_vertices(&self.vertices)?;
        surface.upload_indices(&self.indices)?;

        surface.draw_indexed(self.indices.len() as u32);
        Ok(())
    }

    #[cfg(test)]
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    #[cfg(test)]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn shape_count(&self) -> u32 {
        self.shape_count
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.shape_count == 0
    }

    fn push_vertex(&mut self, position: Vec2, color: Vec3) {
        self.vertices.extend_from_slice(&[position.x, position.y, color.x, color.y, color.z]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Clear([f32; 3]),
        UseProgram(&'static str),
        UploadVertices(usize),
        UploadIndices(usize),
        Draw(u32),
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<Call>,
        vertices: Vec<f32>,
        indices: Vec<u32>,
    }

    impl RecordingSurface {
        fn draws(&self) -> Vec<u32> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Draw(n) => Some(*n),
                    _ => None,
                })
                .collect()
        }
    }

    impl RenderSurface for RecordingSurface {
        type Program = &'static str;

        fn clear(&mut self, color: Vec3) {
            self.calls.push(Call::Clear(color.to_array()));
        }

        fn use_program(&mut self, program: &Self::Program) {
            self.calls.push(Call::UseProgram(*program));
        }

        fn upload_vertices(&mut self, vertices: &[f32]) -> Result<()> {
            self.vertices = vertices.to_vec();
            self.calls.push(Call::UploadVertices(vertices.len()));
            Ok(())
        }

        fn upload_indices(&mut self, indices: &[u32]) -> Result<()> {
            self.indices = indices.to_vec();
            self.calls.push(Call::UploadIndices(indices.len()));
            Ok(())
        }

        fn draw_indexed(&mut self, index_count: u32) {
            self.calls.push(Call::Draw(index_count));
        }
    }

    const BG: Vec3 = Vec3::new(0.1, 0.1, 0.1);

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len(), "{a:?} vs {b:?}");
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn buffer_lengths_track_shape_count() {
        let mut surface = RecordingSurface::default();
        let mut batch = BatchRenderer::new();
        batch.clear(&mut surface, BG);

        for n in 1..=50u32 {
            batch.add_square(Vec2::new(-0.5, 0.5), UVec3::new(10, 20, 30), 0.05);
            assert_eq!(batch.shape_count(), n);
            assert_eq!(batch.vertices().len(), 20 * n as usize);
            assert_eq!(batch.indices().len(), 6 * n as usize);
        }
    }

    #[test]
    fn channel_normalization() {
        assert_eq!(normalize_channel(0), 0.0);
        assert_eq!(normalize_channel(255), 1.0);
        assert!((normalize_channel(128) - 0.502).abs() < 1e-3);
        assert_eq!(normalize_channel(51), 51.0 / 255.0);
    }

    #[test]
    fn out_of_range_channels_pass_through() {
        let mut batch = BatchRenderer::new();
        batch.add_square(Vec2::ZERO, UVec3::new(510, 0, 0), 0.1);
        assert_eq!(batch.vertices()[2], 2.0);
    }

    #[test]
    fn kth_quad_indices() {
        let mut batch = BatchRenderer::new();
        for _ in 0..4 {
            batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);
        }

        for (k, chunk) in batch.indices().chunks(6).enumerate() {
            let k = k as u32 * 4;
            assert_eq!(chunk, [k, k + 1, k + 2, k + 1, k + 2, k + 3]);
        }
    }

    #[test]
    fn square_vertex_geometry() {
        let mut batch = BatchRenderer::new();
        batch.add_square(Vec2::new(0.0, 0.0), UVec3::new(255, 0, 0), 0.2);

        assert_close(
            batch.vertices(),
            &[
                0.0, 0.0, 1.0, 0.0, 0.0, //
                0.2, 0.0, 1.0, 0.0, 0.0, //
                0.0, -0.2, 1.0, 0.0, 0.0, //
                0.2, -0.2, 1.0, 0.0, 0.0,
            ],
        );
    }

    #[test]
    fn negative_size_flips_square() {
        let mut batch = BatchRenderer::new();
        batch.add_square(Vec2::new(0.5, 0.5), UVec3::ZERO, -0.5);
        let v = batch.vertices();
        // top right lands left of the anchor, bottom left lands above it
        assert_eq!(v[5], 0.0);
        assert_eq!(v[11], 1.0);
    }

    #[test]
    fn clear_resets_and_is_idempotent() {
        let mut surface = RecordingSurface::default();
        let mut batch = BatchRenderer::new();

        batch.clear(&mut surface, BG);
        batch.clear(&mut surface, BG);
        assert!(batch.is_empty());
        assert!(batch.vertices().is_empty());
        assert!(batch.indices().is_empty());

        for _ in 0..7 {
            batch.add_square(Vec2::ZERO, UVec3::ONE, 0.1);
        }
        batch.clear(&mut surface, Vec3::new(0.0, 0.5, 1.0));
        assert_eq!(batch.shape_count(), 0);
        assert!(batch.vertices().is_empty());
        assert!(batch.indices().is_empty());

        assert_eq!(
            surface.calls,
            vec![
                Call::Clear(BG.to_array()),
                Call::Clear(BG.to_array()),
                Call::Clear([0.0, 0.5, 1.0]),
            ]
        );
    }

    #[test]
    fn indices_restart_after_clear() {
        let mut surface = RecordingSurface::default();
        let mut batch = BatchRenderer::new();
        batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);
        batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);

        batch.clear(&mut surface, BG);
        batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);
        assert_eq!(batch.indices(), &[0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn add_without_clear_appends_to_stale_geometry() {
        let mut surface = RecordingSurface::default();
        let mut batch = BatchRenderer::new();
        batch.clear(&mut surface, BG);
        batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);
        batch.render(&mut surface, &"quad").unwrap();

        batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);
        assert_eq!(batch.shape_count(), 2);
        assert_eq!(batch.indices()[6], 4);
    }

    #[test]
    fn render_issues_exactly_one_draw() {
        for count in [0u32, 1, 100] {
            let mut surface = RecordingSurface::default();
            let mut batch = BatchRenderer::new();
            batch.clear(&mut surface, BG);
            for i in 0..count {
                batch.add_square(Vec2::new(i as f32 * 0.01, 0.0), UVec3::splat(200), 0.01);
            }

            batch.render(&mut surface, &"quad").unwrap();

            assert_eq!(surface.draws(), vec![batch.indices().len() as u32]);
            assert_eq!(surface.draws()[0], 6 * count);
        }
    }

    #[test]
    fn render_protocol_order() {
        let mut surface = RecordingSurface::default();
        let mut batch = BatchRenderer::new();
        batch.clear(&mut surface, BG);
        batch.add_square(Vec2::ZERO, UVec3::ZERO, 0.1);
        batch.render(&mut surface, &"quad").unwrap();

        assert_eq!(
            surface.calls,
            vec![
                Call::Clear(BG.to_array()),
                Call::UseProgram("quad"),
                Call::UploadVertices(20),
                Call::UploadIndices(6),
                Call::Draw(6),
            ]
        );
    }

    #[test]
    fn three_squares_end_to_end() {
        let mut surface = RecordingSurface::default();
        let mut batch = BatchRenderer::new();

        batch.clear(&mut surface, BG);
        batch.add_square(Vec2::new(0.0, 0.0), UVec3::new(255, 0, 0), 0.1);
        batch.add_square(Vec2::new(0.0, 0.5), UVec3::new(0, 255, 0), 0.1);
        batch.add_square(Vec2::new(0.0, -0.5), UVec3::new(0, 0, 255), 0.1);
        batch.render(&mut surface, &"quad").unwrap();

        assert_eq!(surface.draws().len(), 1);
        assert_eq!(surface.vertices.len() / FLOATS_PER_VERTEX, 12);
        assert_eq!(surface.indices.len(), 18);
        assert_eq!(surface.indices, batch.indices());
        // second square is green
        assert_close(&surface.vertices[20..25], &[0.0, 0.5, 0.0, 1.0, 0.0]);
    }
}
