use super::{
    AudioOutDevice, AudioOutHandle, Blocking, ORBIS_AUDIO_OUT_ERROR_INVALID_FORMAT,
    ORBIS_AUDIO_OUT_ERROR_INVALID_PORT, ORBIS_AUDIO_OUT_ERROR_NOT_OPENED, StreamParams,
    audio_out_error,
};
use crate::error::Result;
use std::collections::BTreeMap;

/// A buffer the device accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub handle: AudioOutHandle,
    pub pcm: Vec<u8>,
    pub blocking: Blocking,
}

/// In-memory audio-out device that records every buffer it is given.
#[derive(Debug, Default)]
pub struct MemoryAudioOut {
    initialized: bool,
    streams: BTreeMap<AudioOutHandle, StreamParams>,
    next_handle: i32,
    outputs: Vec<OutputRecord>,
    fail_next_open: Option<i32>,
}

impl MemoryAudioOut {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Every accepted buffer, oldest first.
    pub fn outputs(&self) -> &[OutputRecord] {
        &self.outputs
    }

    pub fn take_outputs(&mut self) -> Vec<OutputRecord> {
        std::mem::take(&mut self.outputs)
    }

    pub fn stream(&self, handle: AudioOutHandle) -> Option<&StreamParams> {
        self.streams.get(&handle)
    }

    pub fn open_stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Makes the next `open` fail with `code`.
    pub fn fail_next_open(&mut self, code: i32) {
        self.fail_next_open = Some(code);
    }
}

impl AudioOutDevice for MemoryAudioOut {
    fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn open(&mut self, params: &StreamParams) -> Result<AudioOutHandle> {
        if let Some(code) = self.fail_next_open.take() {
            return Err(audio_out_error(code, "open rejected"));
        }
        if params.param.format().is_none() {
            return Err(audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_INVALID_FORMAT,
                format!("unknown format in param {:#x}", params.param.0),
            ));
        }
        let handle = AudioOutHandle(self.next_handle.max(1));
        self.next_handle = handle.0 + 1;
        self.streams.insert(handle, params.clone());
        log::debug!("MemoryAudioOut: opened {} ({:?})", handle, params);
        Ok(handle)
    }

    fn output(&mut self, handle: AudioOutHandle, pcm: &[u8], blocking: Blocking) -> Result<()> {
        if !self.streams.contains_key(&handle) {
            return Err(audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_INVALID_PORT,
                format!("{handle} is not open"),
            ));
        }
        self.outputs.push(OutputRecord {
            handle,
            pcm: pcm.to_vec(),
            blocking,
        });
        Ok(())
    }

    fn close(&mut self, handle: AudioOutHandle) -> Result<()> {
        self.streams
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| audio_out_error(ORBIS_AUDIO_OUT_ERROR_NOT_OPENED, format!("{handle} is not open")))
    }
}
