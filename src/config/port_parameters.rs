use crate::error::{Audio3dError, Result};

/// Smallest number of samples per buffer a port accepts.
pub const MIN_GRANULARITY: u32 = 256;

/// Number of beds a port must be opened with.
pub const REQUIRED_NUM_BEDS: u32 = 2;

/// Output rate of a port. The hardware only mixes at 48 kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rate {
    #[default]
    Rate48000,
}

impl Rate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Rate48000 => 48000,
        }
    }
}

impl TryFrom<u32> for Rate {
    type Error = Audio3dError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Rate48000),
            other => Err(Audio3dError::invalid_parameter(format!(
                "unknown rate {other}"
            ))),
        }
    }
}

/// How queued render units are consumed on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferMode {
    /// Units are never retired by the client.
    NoAdvance,
    /// `port_advance` retires units, nothing is pushed to the device.
    AdvanceNoPush,
    /// `port_advance` retires units and `port_push` forwards their PCM.
    #[default]
    AdvanceAndPush,
}

impl BufferMode {
    pub fn can_advance(self) -> bool {
        !matches!(self, Self::NoAdvance)
    }

    pub fn can_push(self) -> bool {
        matches!(self, Self::AdvanceAndPush)
    }
}

impl TryFrom<u32> for BufferMode {
    type Error = Audio3dError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::NoAdvance),
            1 => Ok(Self::AdvanceNoPush),
            2 => Ok(Self::AdvanceAndPush),
            other => Err(Audio3dError::invalid_parameter(format!(
                "unknown buffer mode {other}"
            ))),
        }
    }
}

/// Parameters a port is opened with.
///
/// The manager keeps its own copy; the caller's value is never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortParameters {
    /// Samples per buffer. Must be at least [`MIN_GRANULARITY`].
    pub granularity: u32,
    pub rate: Rate,
    /// Maximum number of live objects on the port.
    pub max_objects: u32,
    /// Advisory capacity of the port's queue. Not enforced on insertion.
    pub queue_depth: u32,
    pub buffer_mode: BufferMode,
    /// Must equal [`REQUIRED_NUM_BEDS`].
    pub num_beds: u32,
}

impl Default for PortParameters {
    fn default() -> Self {
        Self {
            granularity: MIN_GRANULARITY,
            rate: Rate::Rate48000,
            max_objects: 512,
            queue_depth: 2,
            buffer_mode: BufferMode::AdvanceAndPush,
            num_beds: REQUIRED_NUM_BEDS,
        }
    }
}

impl PortParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn granularity(mut self, granularity: u32) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn max_objects(mut self, max: u32) -> Self {
        self.max_objects = max;
        self
    }

    pub fn queue_depth(mut self, depth: u32) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn buffer_mode(mut self, mode: BufferMode) -> Self {
        self.buffer_mode = mode;
        self
    }

    pub fn num_beds(mut self, num_beds: u32) -> Self {
        self.num_beds = num_beds;
        self
    }

    /// Checks the numeric fields. Enum fields are valid by construction.
    pub fn validate(&self) -> Result<()> {
        if self.num_beds != REQUIRED_NUM_BEDS {
            return Err(Audio3dError::invalid_parameter(format!(
                "num_beds must be {REQUIRED_NUM_BEDS}, got {}",
                self.num_beds
            )));
        }
        if self.queue_depth == 0 {
            return Err(Audio3dError::invalid_parameter("queue_depth is 0"));
        }
        if self.max_objects == 0 {
            return Err(Audio3dError::invalid_parameter("max_objects is 0"));
        }
        if self.granularity < MIN_GRANULARITY {
            return Err(Audio3dError::invalid_parameter(format!(
                "granularity {} below {MIN_GRANULARITY}",
                self.granularity
            )));
        }
        Ok(())
    }
}
