use super::{
    AudioOutDevice, AudioOutFormat, AudioOutHandle, Blocking, ORBIS_AUDIO_OUT_ERROR_INVALID_FORMAT,
    ORBIS_AUDIO_OUT_ERROR_INVALID_PORT, ORBIS_AUDIO_OUT_ERROR_INVALID_SIZE,
    ORBIS_AUDIO_OUT_ERROR_NOT_OPENED, ORBIS_AUDIO_OUT_ERROR_PORT_FULL, StreamParams,
    audio_out_error,
};
use crate::error::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Channels every stream is played with on the host device.
const DEVICE_CHANNELS: u16 = 2;

/// Buffers a stream may hold before `Blocking::Sync` output waits.
const DEFAULT_QUEUED_BUFFERS: usize = 4;

struct OpenStream {
    // Dropping the stream stops playback.
    _stream: cpal::Stream,
    format: AudioOutFormat,
    sender: Sender<Vec<f32>>,
}

/// Audio-out device that plays streams on the default cpal host device.
///
/// Each opened handle owns its own cpal output stream. Buffers handed to
/// [`AudioOutDevice::output`] are decoded to `f32`, folded to stereo and sent
/// through a bounded channel to the stream's callback, which plays silence
/// whenever nothing is queued.
pub struct CpalAudioOut {
    streams: HashMap<AudioOutHandle, OpenStream>,
    next_handle: i32,
    queued_buffers: usize,
    frames_played: Arc<AtomicUsize>,
}

impl Default for CpalAudioOut {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalAudioOut {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
            next_handle: 1,
            queued_buffers: DEFAULT_QUEUED_BUFFERS,
            frames_played: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets how many buffers each stream queues ahead of the device.
    pub fn queued_buffers(mut self, count: usize) -> Self {
        self.queued_buffers = count.max(1);
        self
    }

    /// Frames played by all streams since creation.
    pub fn frames_played(&self) -> usize {
        self.frames_played.load(Ordering::Relaxed)
    }

    fn create_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        receiver: Receiver<Vec<f32>>,
        frames_played: Arc<AtomicUsize>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut pending: Vec<f32> = Vec::new();
        let mut position = 0usize;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut filled = 0usize;
                    for sample in data.iter_mut() {
                        if position >= pending.len() {
                            match receiver.try_recv() {
                                Ok(buffer) => {
                                    pending = buffer;
                                    position = 0;
                                }
                                Err(_) => {
                                    *sample = T::from_sample(0.0f32);
                                    continue;
                                }
                            }
                        }
                        *sample = T::from_sample(pending.get(position).copied().unwrap_or(0.0));
                        position += 1;
                        filled += 1;
                    }
                    frames_played.fetch_add(filled / channels, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio out stream error: {}", err);
                },
                None,
            )
            .map_err(|e| {
                audio_out_error(
                    ORBIS_AUDIO_OUT_ERROR_NOT_OPENED,
                    format!("Failed to build stream: {}", e),
                )
            })
    }
}

impl AudioOutDevice for CpalAudioOut {
    fn initialize(&mut self) -> Result<()> {
        let host = cpal::default_host();
        log::info!("CpalAudioOut: using host {:?}", host.id());
        Ok(())
    }

    fn open(&mut self, params: &StreamParams) -> Result<AudioOutHandle> {
        let format = params.param.format().ok_or_else(|| {
            audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_INVALID_FORMAT,
                format!("unknown format in param {:#x}", params.param.0),
            )
        })?;

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_NOT_OPENED,
                "No default output device available",
            )
        })?;

        let default_config = device.default_output_config().map_err(|e| {
            audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_NOT_OPENED,
                format!("Failed to get default config: {}", e),
            )
        })?;

        let config = cpal::StreamConfig {
            channels: DEVICE_CHANNELS,
            sample_rate: cpal::SampleRate(params.freq),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = crossbeam_channel::bounded(self.queued_buffers);
        let frames_played = self.frames_played.clone();

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::create_stream::<f32>(&device, &config, receiver, frames_played)?
            }
            cpal::SampleFormat::I16 => {
                Self::create_stream::<i16>(&device, &config, receiver, frames_played)?
            }
            cpal::SampleFormat::U16 => {
                Self::create_stream::<u16>(&device, &config, receiver, frames_played)?
            }
            other => {
                return Err(audio_out_error(
                    ORBIS_AUDIO_OUT_ERROR_INVALID_FORMAT,
                    format!("Unsupported device sample format {:?}", other),
                ));
            }
        };

        stream.play().map_err(|e| {
            audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_NOT_OPENED,
                format!("Failed to start stream: {}", e),
            )
        })?;

        let handle = AudioOutHandle(self.next_handle);
        self.next_handle += 1;
        log::info!(
            "CpalAudioOut: opened {} ({:?}, {} Hz, {} frames)",
            handle,
            format,
            params.freq,
            params.len
        );
        self.streams.insert(
            handle,
            OpenStream {
                _stream: stream,
                format,
                sender,
            },
        );
        Ok(handle)
    }

    fn output(&mut self, handle: AudioOutHandle, pcm: &[u8], blocking: Blocking) -> Result<()> {
        let stream = self.streams.get(&handle).ok_or_else(|| {
            audio_out_error(ORBIS_AUDIO_OUT_ERROR_INVALID_PORT, format!("{handle} is not open"))
        })?;

        let Some(samples) = prepare(pcm, stream.format)? else {
            log::debug!("CpalAudioOut: empty buffer for {}, nothing queued", handle);
            return Ok(());
        };

        match blocking {
            Blocking::Sync => stream.sender.send(samples).map_err(|_| {
                audio_out_error(ORBIS_AUDIO_OUT_ERROR_NOT_OPENED, "stream callback is gone")
            }),
            Blocking::Async => match stream.sender.try_send(samples) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    log::warn!("CpalAudioOut: {} is full, dropping buffer", handle);
                    Err(audio_out_error(
                        ORBIS_AUDIO_OUT_ERROR_PORT_FULL,
                        format!("{handle} queue is full"),
                    ))
                }
                Err(TrySendError::Disconnected(_)) => Err(audio_out_error(
                    ORBIS_AUDIO_OUT_ERROR_NOT_OPENED,
                    "stream callback is gone",
                )),
            },
        }
    }

    fn close(&mut self, handle: AudioOutHandle) -> Result<()> {
        match self.streams.remove(&handle) {
            Some(_) => {
                log::info!("CpalAudioOut: closed {}", handle);
                Ok(())
            }
            None => Err(audio_out_error(
                ORBIS_AUDIO_OUT_ERROR_NOT_OPENED,
                format!("{handle} is not open"),
            )),
        }
    }
}

/// Converts one output buffer into the stereo samples the callback plays.
/// Returns `None` for an empty buffer.
fn prepare(pcm: &[u8], format: AudioOutFormat) -> Result<Option<Vec<f32>>> {
    if pcm.is_empty() {
        return Ok(None);
    }
    if pcm.len() % format.frame_size() != 0 {
        return Err(audio_out_error(
            ORBIS_AUDIO_OUT_ERROR_INVALID_SIZE,
            format!(
                "{} bytes is not a whole number of {:?} frames",
                pcm.len(),
                format
            ),
        ));
    }
    Ok(Some(to_stereo(&decode(pcm, format), format.channels())))
}

/// Decodes little-endian PCM bytes into `f32` samples in [-1, 1].
fn decode(pcm: &[u8], format: AudioOutFormat) -> Vec<f32> {
    if format.is_float() {
        pcm.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    } else {
        pcm.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect()
    }
}

/// Folds interleaved frames to stereo: mono is duplicated, wider layouts keep front left/right.
fn to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|s| [*s, *s]).collect(),
        n => samples
            .chunks_exact(n as usize)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
