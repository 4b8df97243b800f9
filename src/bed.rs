//! Bed submissions: fixed channel layouts written straight into a port's queue.

use crate::error::{Audio3dError, Result};

/// Sample format of bed PCM.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedFormat {
    S16 = 0x0,
    Float = 0x1,
}

impl BedFormat {
    /// Size of one sample in bytes. Also the required buffer alignment.
    pub fn sample_size(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::Float => 4,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0 => Some(Self::S16),
            0x1 => Some(Self::Float),
            _ => None,
        }
    }
}

/// Where a bed is audible.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputRoute {
    #[default]
    Both = 0x0,
    HeadmountOnly = 0x1,
    TvOnly = 0x2,
}

impl TryFrom<u32> for OutputRoute {
    type Error = Audio3dError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0x0 => Ok(Self::Both),
            0x1 => Ok(Self::HeadmountOnly),
            0x2 => Ok(Self::TvOnly),
            other => Err(Audio3dError::invalid_parameter(format!(
                "unknown output route {other}"
            ))),
        }
    }
}

/// A bed write as submitted by the client, before validation.
#[derive(Debug, Clone, Copy)]
pub struct BedWrite<'a> {
    pub num_channels: u32,
    pub format: BedFormat,
    pub buffer: &'a [u8],
    pub num_samples: u32,
    pub output_route: OutputRoute,
    pub restricted: bool,
}

impl<'a> BedWrite<'a> {
    /// A bed audible on every output and not restricted.
    pub fn new(num_channels: u32, format: BedFormat, buffer: &'a [u8], num_samples: u32) -> Self {
        Self {
            num_channels,
            format,
            buffer,
            num_samples,
            output_route: OutputRoute::Both,
            restricted: false,
        }
    }

    pub fn output_route(mut self, route: OutputRoute) -> Self {
        self.output_route = route;
        self
    }

    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    /// The channel/buffer/sample-count guard. Failing it is not necessarily an error,
    /// see [`BedGuardPolicy`](crate::config::BedGuardPolicy).
    pub fn passes_guard(&self) -> bool {
        is_bed_layout(self.num_channels) && !self.buffer.is_empty() && self.num_samples != 0
    }

    /// Checks alignment and length, returning the bytes the bed covers.
    pub fn payload(&self) -> Result<&'a [u8]> {
        if !is_aligned(self.buffer, self.format) {
            return Err(Audio3dError::invalid_parameter(format!(
                "{:?} bed buffer is not {}-byte aligned",
                self.format,
                self.format.sample_size()
            )));
        }
        let size = bed_size(self.num_channels, self.format, self.num_samples)
            .filter(|size| *size <= self.buffer.len())
            .ok_or_else(|| {
                Audio3dError::invalid_parameter(format!(
                    "bed of {} samples x {} channels does not fit in {} bytes",
                    self.num_samples,
                    self.num_channels,
                    self.buffer.len()
                ))
            })?;
        Ok(&self.buffer[..size])
    }
}

/// Whether `num_channels` is one of the fixed bed layouts (2, 6, 8 or 24 channels).
pub fn is_bed_layout(num_channels: u32) -> bool {
    (num_channels | 4) == 6 || (num_channels | 0x10) == 24
}

/// Number of bytes a bed of this shape occupies, or `None` on overflow.
pub fn bed_size(num_channels: u32, format: BedFormat, num_samples: u32) -> Option<usize> {
    (num_samples as usize)
        .checked_mul(num_channels as usize)?
        .checked_mul(format.sample_size())
}

/// Whether `buffer` starts on a boundary suitable for `format`.
pub fn is_aligned(buffer: &[u8], format: BedFormat) -> bool {
    (buffer.as_ptr() as usize) % format.sample_size() == 0
}
