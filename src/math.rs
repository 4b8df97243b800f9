//! Math types for Audio3D attribute payloads

pub use glam::Vec3;

/// Reads a little-endian `f32` from the start of `bytes`.
pub fn f32_from_le(bytes: &[u8]) -> Option<f32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(f32::from_le_bytes(raw))
}

/// Reads a little-endian `u32` from the start of `bytes`.
pub fn u32_from_le(bytes: &[u8]) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// Reads three consecutive little-endian `f32`s (x, y, z).
pub fn vec3_from_le(bytes: &[u8]) -> Option<Vec3> {
    let x = f32_from_le(bytes.get(0..4)?)?;
    let y = f32_from_le(bytes.get(4..8)?)?;
    let z = f32_from_le(bytes.get(8..12)?)?;
    Some(Vec3::new(x, y, z))
}

pub fn vec3_to_le(v: Vec3) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..4].copy_from_slice(&v.x.to_le_bytes());
    out[4..8].copy_from_slice(&v.y.to_le_bytes());
    out[8..12].copy_from_slice(&v.z.to_le_bytes());
    out
}
