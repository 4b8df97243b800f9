//! Object attributes.
//!
//! An attribute pairs an [`AttributeId`] with an opaque value. The manager copies
//! the value when it is set, so callers are free to reuse their buffers as soon as
//! the call returns. Only [`AttributeId::Pcm`] is ever interpreted by the manager:
//! its value is forwarded to the audio-out device on push. Everything else is kept
//! for the mixer, which can decode it with the typed readers below.

use crate::error::{Audio3dError, Result};
use crate::math::{self, Vec3};

/// Identifies what an attribute value means.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    Pcm = 0x1,
    Priority = 0x2,
    Position = 0x3,
    Spread = 0x4,
    Gain = 0x5,
    Passthrough = 0x6,
    ResetState = 0x7,
    ApplicationSpecific = 0x8,
    Ambisonics = 0x9,
    Restricted = 0xA,
    OutputRoute = 0xB,
    LateReverbLevel = 0x10001,
    DownmixSpreadRadius = 0x10002,
    DownmixSpreadHeightAware = 0x10003,
}

impl TryFrom<u32> for AttributeId {
    type Error = Audio3dError;

    fn try_from(raw: u32) -> Result<Self> {
        Ok(match raw {
            0x1 => Self::Pcm,
            0x2 => Self::Priority,
            0x3 => Self::Position,
            0x4 => Self::Spread,
            0x5 => Self::Gain,
            0x6 => Self::Passthrough,
            0x7 => Self::ResetState,
            0x8 => Self::ApplicationSpecific,
            0x9 => Self::Ambisonics,
            0xA => Self::Restricted,
            0xB => Self::OutputRoute,
            0x10001 => Self::LateReverbLevel,
            0x10002 => Self::DownmixSpreadRadius,
            0x10003 => Self::DownmixSpreadHeightAware,
            other => {
                return Err(Audio3dError::invalid_parameter(format!(
                    "unknown attribute id {other:#x}"
                )));
            }
        })
    }
}

/// A typed key with an owned, opaque value.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    id: AttributeId,
    value: Vec<u8>,
    value_size: usize,
}

impl Attribute {
    /// Creates an attribute holding a copy of `value`.
    pub fn new(id: AttributeId, value: &[u8]) -> Self {
        Self {
            id,
            value: value.to_vec(),
            value_size: value.len(),
        }
    }

    /// Same id and size, without the value bytes.
    pub(crate) fn without_value(&self) -> Self {
        Self {
            id: self.id,
            value: Vec::new(),
            value_size: self.value_size,
        }
    }

    pub fn pcm(samples: &[u8]) -> Self {
        Self::new(AttributeId::Pcm, samples)
    }

    pub fn gain(gain: f32) -> Self {
        Self::new(AttributeId::Gain, &gain.to_le_bytes())
    }

    pub fn spread(spread: f32) -> Self {
        Self::new(AttributeId::Spread, &spread.to_le_bytes())
    }

    pub fn position(position: Vec3) -> Self {
        Self::new(AttributeId::Position, &math::vec3_to_le(position))
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Size of the value as submitted, even when the bytes were not kept.
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn is_pcm(&self) -> bool {
        self.id == AttributeId::Pcm
    }

    /// Reads the value as a little-endian `f32` (gain, spread, reverb level, radius).
    pub fn as_f32(&self) -> Option<f32> {
        math::f32_from_le(&self.value)
    }

    /// Reads the value as a little-endian `u32` (priority, route, flags).
    pub fn as_u32(&self) -> Option<u32> {
        math::u32_from_le(&self.value)
    }

    /// Reads the value as an (x, y, z) position.
    pub fn as_vec3(&self) -> Option<Vec3> {
        math::vec3_from_le(&self.value)
    }
}
