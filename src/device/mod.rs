//! Audio-out device seam.
//!
//! The manager never talks to audio hardware itself. Every stream it opens and every
//! buffer it forwards goes through an [`AudioOutDevice`], which keeps the port/queue
//! logic testable without a sound card:
//! - [`MemoryAudioOut`] records what it receives (tests, headless hosts)
//! - `CpalAudioOut` plays through the default host device (feature `cpal-output`)

#[cfg(feature = "cpal-output")]
mod cpal_output;
mod memory;

#[cfg(feature = "cpal-output")]
pub use cpal_output::CpalAudioOut;
pub use memory::{MemoryAudioOut, OutputRecord};

use crate::error::{Audio3dError, Result};

pub const ORBIS_AUDIO_OUT_ERROR_NOT_OPENED: i32 = 0x8026_0001_u32 as i32;
pub const ORBIS_AUDIO_OUT_ERROR_INVALID_PORT: i32 = 0x8026_0003_u32 as i32;
pub const ORBIS_AUDIO_OUT_ERROR_PORT_FULL: i32 = 0x8026_0005_u32 as i32;
pub const ORBIS_AUDIO_OUT_ERROR_INVALID_SIZE: i32 = 0x8026_0006_u32 as i32;
pub const ORBIS_AUDIO_OUT_ERROR_INVALID_FORMAT: i32 = 0x8026_0007_u32 as i32;

/// Builds the error a device reports for a failed call.
pub fn audio_out_error(code: i32, message: impl Into<String>) -> Audio3dError {
    Audio3dError::AudioOut {
        code,
        message: message.into(),
    }
}

/// Opaque handle of an open output stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioOutHandle(pub i32);

impl std::fmt::Display for AudioOutHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AudioOutHandle({})", self.0)
    }
}

/// Logical output a stream is opened on.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioOutPortType {
    #[default]
    Main = 0,
    Bgm = 1,
    Voice = 2,
    Personal = 3,
    Padspk = 4,
    Aux = 127,
}

impl TryFrom<i32> for AudioOutPortType {
    type Error = Audio3dError;

    fn try_from(raw: i32) -> Result<Self> {
        Ok(match raw {
            0 => Self::Main,
            1 => Self::Bgm,
            2 => Self::Voice,
            3 => Self::Personal,
            4 => Self::Padspk,
            127 => Self::Aux,
            other => {
                return Err(Audio3dError::invalid_parameter(format!(
                    "unknown audio out port type {other}"
                )));
            }
        })
    }
}

/// Sample layout of an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOutFormat {
    S16Mono,
    S16Stereo,
    S16EightChannel,
    FloatMono,
    FloatStereo,
    FloatEightChannel,
    S16EightChannelStd,
    FloatEightChannelStd,
}

impl AudioOutFormat {
    pub fn channels(self) -> u16 {
        match self {
            Self::S16Mono | Self::FloatMono => 1,
            Self::S16Stereo | Self::FloatStereo => 2,
            Self::S16EightChannel
            | Self::FloatEightChannel
            | Self::S16EightChannelStd
            | Self::FloatEightChannelStd => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::FloatMono
                | Self::FloatStereo
                | Self::FloatEightChannel
                | Self::FloatEightChannelStd
        )
    }

    pub fn sample_size(self) -> usize {
        if self.is_float() { 4 } else { 2 }
    }

    /// Bytes in one frame (one sample for every channel).
    pub fn frame_size(self) -> usize {
        self.sample_size() * self.channels() as usize
    }
}

/// Extended stream parameter word. The low byte selects the [`AudioOutFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioOutParam(pub u32);

impl AudioOutParam {
    pub fn from_format(format: AudioOutFormat) -> Self {
        let raw = match format {
            AudioOutFormat::S16Mono => 0,
            AudioOutFormat::S16Stereo => 1,
            AudioOutFormat::S16EightChannel => 2,
            AudioOutFormat::FloatMono => 3,
            AudioOutFormat::FloatStereo => 4,
            AudioOutFormat::FloatEightChannel => 5,
            AudioOutFormat::S16EightChannelStd => 6,
            AudioOutFormat::FloatEightChannelStd => 7,
        };
        Self(raw)
    }

    pub fn format(self) -> Option<AudioOutFormat> {
        Some(match self.0 & 0xFF {
            0 => AudioOutFormat::S16Mono,
            1 => AudioOutFormat::S16Stereo,
            2 => AudioOutFormat::S16EightChannel,
            3 => AudioOutFormat::FloatMono,
            4 => AudioOutFormat::FloatStereo,
            5 => AudioOutFormat::FloatEightChannel,
            6 => AudioOutFormat::S16EightChannelStd,
            7 => AudioOutFormat::FloatEightChannelStd,
            _ => return None,
        })
    }
}

/// Whether forwarding a buffer waits for the device to accept it.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blocking {
    Async = 0,
    #[default]
    Sync = 1,
}

impl TryFrom<u32> for Blocking {
    type Error = Audio3dError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Async),
            1 => Ok(Self::Sync),
            other => Err(Audio3dError::invalid_parameter(format!(
                "unknown blocking mode {other}"
            ))),
        }
    }
}

/// Everything a device needs to open a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub user_id: i32,
    pub port_type: AudioOutPortType,
    pub index: i32,
    /// Frames per output call.
    pub len: u32,
    pub freq: u32,
    pub param: AudioOutParam,
}

/// One buffer of a batched output call.
#[derive(Debug, Clone, Copy)]
pub struct OutputParam<'a> {
    pub handle: AudioOutHandle,
    pub pcm: &'a [u8],
}

/// The audio-output collaborator the manager forwards to.
pub trait AudioOutDevice {
    /// Prepares the output subsystem. Called once per manager initialization.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Opens an output stream.
    fn open(&mut self, params: &StreamParams) -> Result<AudioOutHandle>;

    /// Queues one buffer on a stream.
    fn output(&mut self, handle: AudioOutHandle, pcm: &[u8], blocking: Blocking) -> Result<()>;

    /// Queues one buffer on each of several streams.
    fn output_multi(&mut self, params: &[OutputParam<'_>]) -> Result<()> {
        for param in params {
            self.output(param.handle, param.pcm, Blocking::Sync)?;
        }
        Ok(())
    }

    /// Releases a stream.
    fn close(&mut self, handle: AudioOutHandle) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_selects_format() {
        for format in [
            AudioOutFormat::S16Mono,
            AudioOutFormat::FloatStereo,
            AudioOutFormat::FloatEightChannelStd,
        ] {
            assert_eq!(AudioOutParam::from_format(format).format(), Some(format));
        }
        assert_eq!(AudioOutParam(0x100 | 4).format(), Some(AudioOutFormat::FloatStereo));
        assert_eq!(AudioOutParam(8).format(), None);
    }

    #[test]
    fn frame_sizes() {
        assert_eq!(AudioOutFormat::S16Stereo.frame_size(), 4);
        assert_eq!(AudioOutFormat::FloatEightChannel.frame_size(), 32);
        assert_eq!(AudioOutFormat::FloatMono.frame_size(), 4);
    }

    #[test]
    fn raw_port_type_and_blocking() {
        assert_eq!(AudioOutPortType::try_from(127), Ok(AudioOutPortType::Aux));
        assert!(AudioOutPortType::try_from(5).is_err());
        assert_eq!(Blocking::try_from(0), Ok(Blocking::Async));
        assert!(Blocking::try_from(2).is_err());
    }
}
