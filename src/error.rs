//! Error types for Audio3D

use thiserror::Error;

/// Status code returned by every successful call.
pub const ORBIS_OK: i32 = 0;

pub const ORBIS_AUDIO3D_ERROR_NOT_READY: i32 = 0x80EA_0002_u32 as i32;
pub const ORBIS_AUDIO3D_ERROR_OUT_OF_RESOURCES: i32 = 0x80EA_0004_u32 as i32;
pub const ORBIS_AUDIO3D_ERROR_NOT_SUPPORTED: i32 = 0x80EA_0005_u32 as i32;
pub const ORBIS_AUDIO3D_ERROR_INVALID_PORT: i32 = 0x80EA_0006_u32 as i32;
pub const ORBIS_AUDIO3D_ERROR_INVALID_OBJECT: i32 = 0x80EA_0007_u32 as i32;
pub const ORBIS_AUDIO3D_ERROR_INVALID_PARAMETER: i32 = 0x80EA_0008_u32 as i32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Audio3dError {
    #[error("Audio3d is not ready")]
    NotReady,

    #[error("Out of resources")]
    OutOfResources,

    #[error("Operation not supported by the port's buffer mode")]
    NotSupported,

    #[error("Invalid port")]
    InvalidPort,

    #[error("Invalid object")]
    InvalidObject,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Audio out error {code:#010x}: {message}")]
    AudioOut { code: i32, message: String },
}

impl Audio3dError {
    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Status code reported across the call surface for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotReady => ORBIS_AUDIO3D_ERROR_NOT_READY,
            Self::OutOfResources => ORBIS_AUDIO3D_ERROR_OUT_OF_RESOURCES,
            Self::NotSupported => ORBIS_AUDIO3D_ERROR_NOT_SUPPORTED,
            Self::InvalidPort => ORBIS_AUDIO3D_ERROR_INVALID_PORT,
            Self::InvalidObject => ORBIS_AUDIO3D_ERROR_INVALID_OBJECT,
            Self::InvalidParameter(_) => ORBIS_AUDIO3D_ERROR_INVALID_PARAMETER,
            Self::AudioOut { code, .. } => *code,
        }
    }
}

pub type Result<T> = std::result::Result<T, Audio3dError>;

/// Collapses a unit result into the status code the call surface returns.
pub fn status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => ORBIS_OK,
        Err(e) => e.code(),
    }
}
