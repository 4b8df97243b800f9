//! Audio3D port, object and queue manager.
//!
//! Clients open ports, reserve positional objects on them, attach attributes or raw
//! bed PCM, and then advance or push the queued render units. Pushed PCM is handed to
//! an [`AudioOutDevice`].
//!
//! # Quick Start
//!
//! ```no_run
//! use audio3d::{Audio3dDesc, Audio3dManager, BedFormat, Blocking, MemoryAudioOut, PortParameters};
//! use audio3d::device::{AudioOutFormat, AudioOutParam, AudioOutPortType, StreamParams};
//!
//! let mut manager = Audio3dManager::new(Audio3dDesc::default(), MemoryAudioOut::new());
//! manager.initialize(0)?;
//!
//! let parameters = PortParameters::default();
//! let port = manager.port_open(1, &parameters)?;
//! manager.audio_out_open(
//!     port,
//!     StreamParams {
//!         user_id: 1,
//!         port_type: AudioOutPortType::Main,
//!         index: 0,
//!         len: parameters.granularity,
//!         freq: 48000,
//!         param: AudioOutParam::from_format(AudioOutFormat::FloatStereo),
//!     },
//! )?;
//!
//! // Float beds must be 4-byte aligned.
//! let storage = vec![0u8; 256 * 2 * 4 + 4];
//! let offset = storage.as_ptr().align_offset(4);
//! let silence = &storage[offset..offset + 256 * 2 * 4];
//! manager.bed_write(port, 2, BedFormat::Float, silence, 256)?;
//! manager.port_push(port, Blocking::Sync)?;
//! # Ok::<(), audio3d::Audio3dError>(())
//! ```
//!
//! The [`hle`] module exposes the same operations as status-code functions.

pub mod attribute;
pub mod bed;
pub mod config;
pub mod device;
pub mod error;
pub mod hle;
pub mod manager;
pub mod math;
pub mod port;
pub mod queue;

pub use attribute::{Attribute, AttributeId};
pub use bed::{BedFormat, BedWrite, OutputRoute};
pub use config::{Audio3dDesc, BedGuardPolicy, BufferMode, PortParameters, Rate};
#[cfg(feature = "cpal-output")]
pub use device::CpalAudioOut;
pub use device::{AudioOutDevice, AudioOutHandle, Blocking, MemoryAudioOut};
pub use error::{Audio3dError, Result};
pub use manager::{Audio3dManager, QueueLevel};
pub use port::{ObjectId, PortId};
