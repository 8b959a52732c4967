//! Constant-buffer layout shared with the shaders
//!
//! Both per-frame constant buffers (scene and shadow) use the same block. The
//! light count is baked into the shaders, so changing it means updating them.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::RawMat4;

/// Number of lights in the constant block
pub const NUM_LIGHTS: usize = 3;

/// Required size granularity for constant buffers
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// Per-light constants
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    /// Light position
    pub position: [f32; 4],
    /// Light direction
    pub direction: [f32; 4],
    /// Light color
    pub color: [f32; 4],
    /// Attenuation parameters
    pub falloff: [f32; 4],
    /// Light camera view matrix
    pub view: RawMat4,
    /// Light camera projection matrix
    pub projection: RawMat4,
}

/// Constant block bound to every draw of a pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneConstants {
    /// Model matrix
    pub model: RawMat4,
    /// View matrix of the pass camera
    pub view: RawMat4,
    /// Projection matrix of the pass camera
    pub projection: RawMat4,
    /// Ambient light color
    pub ambient_color: [f32; 4],
    /// Non-zero when the pass samples the shadow map
    pub sample_shadow_map: u32,
    /// Keeps the light array 16-byte aligned
    pub padding: [u32; 3],
    /// Light array
    pub lights: [LightConstants; NUM_LIGHTS],
}

impl SceneConstants {
    /// Size of the constant buffer allocation, rounded up to the alignment
    pub const fn buffer_size() -> usize {
        aligned_constant_buffer_size(std::mem::size_of::<Self>())
    }

    /// Whether the pass samples the shadow map
    pub const fn samples_shadow_map(&self) -> bool {
        self.sample_shadow_map != 0
    }

    /// Decode a constant block from the start of a mapped buffer
    pub fn read_from(bytes: &[u8]) -> Option<Self> {
        let size = std::mem::size_of::<Self>();
        (bytes.len() >= size).then(|| bytemuck::pod_read_unaligned(&bytes[..size]))
    }
}

/// Round a byte size up to the constant-buffer alignment
pub const fn aligned_constant_buffer_size(size: usize) -> usize {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_has_no_implicit_padding() {
        assert_eq!(std::mem::size_of::<LightConstants>(), 192);
        assert_eq!(std::mem::size_of::<SceneConstants>(), 3 * 64 + 16 + 16 + NUM_LIGHTS * 192);
    }

    #[test]
    fn test_buffer_size_is_aligned() {
        assert_eq!(SceneConstants::buffer_size() % CONSTANT_BUFFER_ALIGNMENT, 0);
        assert!(SceneConstants::buffer_size() >= std::mem::size_of::<SceneConstants>());
        assert_eq!(aligned_constant_buffer_size(1), 256);
        assert_eq!(aligned_constant_buffer_size(256), 256);
        assert_eq!(aligned_constant_buffer_size(257), 512);
    }

    #[test]
    fn test_read_back_from_unaligned_bytes() {
        let mut constants = SceneConstants::zeroed();
        constants.sample_shadow_map = 1;
        constants.ambient_color = [0.1, 0.2, 0.3, 1.0];

        let mut bytes = vec![0_u8; SceneConstants::buffer_size() + 1];
        bytes[1..=std::mem::size_of::<SceneConstants>()].copy_from_slice(bytemuck::bytes_of(&constants));

        let decoded = SceneConstants::read_from(&bytes[1..]).unwrap();
        assert!(decoded.samples_shadow_map());
        assert_eq!(decoded, constants);
        assert!(SceneConstants::read_from(&bytes[..8]).is_none());
    }
}
