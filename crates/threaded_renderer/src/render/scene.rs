//! Scene description consumed by the frame pipeline
//!
//! Asset loading lives outside this crate. Callers hand over a flat draw list
//! together with the raw vertex, index and texture payloads it references;
//! [`SceneDescription::synthetic`] builds a deterministic stand-in for tests
//! and the demo.

/// One indexed draw of the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCall {
    /// Number of indices to draw
    pub index_count: u32,
    /// First index in the shared index buffer
    pub index_start: u32,
    /// Value added to each index before fetching a vertex
    pub vertex_base: i32,
    /// Diffuse texture bound for this draw in the scene pass
    pub diffuse_texture_index: u32,
}

/// Raw texel data of one diffuse texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// RGBA8 texels
    pub pixels: Vec<u32>,
}

/// Flat scene: draw list plus the buffers it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescription {
    /// Draw calls in asset order
    pub draws: Vec<DrawCall>,
    /// Interleaved vertex data
    pub vertex_data: Vec<u8>,
    /// Size of one vertex in bytes
    pub vertex_stride: u32,
    /// 32-bit index data
    pub index_data: Vec<u8>,
    /// Diffuse textures indexed by `DrawCall::diffuse_texture_index`
    pub textures: Vec<TextureData>,
}

/// Position, normal, texcoord, tangent
const SYNTHETIC_VERTEX_STRIDE: u32 = 44;

impl SceneDescription {
    /// Build a deterministic scene with `draw_count` draws over `texture_count` textures
    ///
    /// Draw sizes vary so partitions do uneven amounts of work, the way a real
    /// asset's meshes would.
    pub fn synthetic(draw_count: usize, texture_count: usize) -> Self {
        let texture_count = texture_count.max(1);
        let mut draws = Vec::with_capacity(draw_count);
        let mut index_start = 0_u32;
        let mut vertex_base = 0_i32;

        for i in 0..draw_count {
            let triangles = 12 * (1 + (i as u32 * 7) % 5);
            let index_count = triangles * 3;
            draws.push(DrawCall {
                index_count,
                index_start,
                vertex_base,
                diffuse_texture_index: (i % texture_count) as u32,
            });
            index_start += index_count;
            vertex_base += (triangles / 2 + 2) as i32;
        }

        let vertex_count = usize::try_from(vertex_base).unwrap_or(0);
        let vertex_data = (0..vertex_count * SYNTHETIC_VERTEX_STRIDE as usize)
            .map(|byte| (byte % 251) as u8)
            .collect();
        let index_data = (0..index_start)
            .flat_map(|index| (index % 24).to_le_bytes())
            .collect();
        let textures = (0..texture_count)
            .map(|t| TextureData {
                width: 4,
                height: 4,
                pixels: vec![0xFF00_0000 | (t as u32 * 0x0010_2030); 16],
            })
            .collect();

        Self {
            draws,
            vertex_data,
            vertex_stride: SYNTHETIC_VERTEX_STRIDE,
            index_data,
            textures,
        }
    }

    /// Number of draw calls
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_scene_is_contiguous() {
        let scene = SceneDescription::synthetic(10, 3);
        assert_eq!(scene.draw_count(), 10);
        assert_eq!(scene.textures.len(), 3);

        let mut expected_start = 0;
        for draw in &scene.draws {
            assert_eq!(draw.index_start, expected_start);
            assert_eq!(draw.index_count % 3, 0);
            assert!(draw.diffuse_texture_index < 3);
            expected_start += draw.index_count;
        }
        assert_eq!(scene.index_data.len(), expected_start as usize * 4);
    }

    #[test]
    fn test_synthetic_scene_is_deterministic() {
        assert_eq!(SceneDescription::synthetic(16, 4), SceneDescription::synthetic(16, 4));
    }
}
