//! Status-code call surface.
//!
//! Every `sce_audio3d_*` function drives an [`Audio3dManager`] with the raw values a guest
//! passes across the ABI and returns `ORBIS_OK` or a negative error code. Null pointers
//! arrive as `None`. Output parameters are written only when the call succeeds.

use crate::attribute::{Attribute, AttributeId};
use crate::bed::{BedFormat, BedWrite, OutputRoute};
use crate::config::{BufferMode, PortParameters, Rate};
use crate::device::{
    AudioOutDevice, AudioOutHandle, AudioOutParam, AudioOutPortType, Blocking, OutputParam,
    StreamParams,
};
use crate::error::{Audio3dError, ORBIS_OK, Result, status};
use crate::manager::Audio3dManager;
use crate::port::{ObjectId, PortId};

/// Port parameters as laid out by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenParameters {
    pub size_this: u64,
    pub granularity: u32,
    pub rate: u32,
    pub max_objects: u32,
    pub queue_depth: u32,
    pub buffer_mode: u32,
    pub num_beds: u32,
}

impl Default for OpenParameters {
    fn default() -> Self {
        let defaults = PortParameters::default();
        Self {
            size_this: std::mem::size_of::<Self>() as u64,
            granularity: defaults.granularity,
            rate: 0,
            max_objects: defaults.max_objects,
            queue_depth: defaults.queue_depth,
            buffer_mode: defaults.buffer_mode as u32,
            num_beds: defaults.num_beds,
        }
    }
}

impl TryFrom<&OpenParameters> for PortParameters {
    type Error = Audio3dError;

    fn try_from(raw: &OpenParameters) -> Result<Self> {
        Ok(Self {
            granularity: raw.granularity,
            rate: Rate::try_from(raw.rate)?,
            max_objects: raw.max_objects,
            queue_depth: raw.queue_depth,
            buffer_mode: BufferMode::try_from(raw.buffer_mode)?,
            num_beds: raw.num_beds,
        })
    }
}

/// One attribute as passed by the guest.
#[derive(Debug, Clone, Copy)]
pub struct RawAttribute<'a> {
    pub attribute_id: u32,
    pub value: Option<&'a [u8]>,
}

impl TryFrom<&RawAttribute<'_>> for Attribute {
    type Error = Audio3dError;

    fn try_from(raw: &RawAttribute<'_>) -> Result<Self> {
        let id = AttributeId::try_from(raw.attribute_id)?;
        let value = raw
            .value
            .ok_or_else(|| Audio3dError::invalid_parameter(format!("{id:?} value is null")))?;
        Ok(Attribute::new(id, value))
    }
}

fn write_output<T>(result: Result<T>, out: Option<&mut T>) -> i32 {
    match (result, out) {
        (Ok(value), Some(out)) => {
            *out = value;
            ORBIS_OK
        }
        (Ok(_), None) => ORBIS_OK,
        (Err(e), _) => e.code(),
    }
}

pub fn sce_audio3d_initialize<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    reserved: i64,
) -> i32 {
    log::debug!("sceAudio3dInitialize(reserved = {})", reserved);
    status(manager.initialize(reserved))
}

pub fn sce_audio3d_terminate<D: AudioOutDevice>(manager: &mut Audio3dManager<D>) -> i32 {
    log::debug!("sceAudio3dTerminate()");
    status(manager.terminate())
}

/// Opens a port and writes its id to `id`.
pub fn sce_audio3d_port_open<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    user_id: i32,
    parameters: Option<&OpenParameters>,
    id: Option<&mut u32>,
) -> i32 {
    log::debug!("sceAudio3dPortOpen(user_id = {}, parameters = {:?})", user_id, parameters);

    let (Some(parameters), Some(id)) = (parameters, id) else {
        log::debug!("sceAudio3dPortOpen: null parameters or id");
        return Audio3dError::invalid_parameter("null pointer").code();
    };
    let result = PortParameters::try_from(parameters)
        .and_then(|parameters| manager.port_open(user_id, &parameters))
        .map(|port| port.0);
    write_output(result, Some(id))
}

pub fn sce_audio3d_port_close<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
) -> i32 {
    log::debug!("sceAudio3dPortClose(port_id = {})", port_id);
    status(manager.port_close(PortId(port_id)))
}

pub fn sce_audio3d_object_reserve<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    id: Option<&mut u32>,
) -> i32 {
    log::debug!("sceAudio3dObjectReserve(port_id = {})", port_id);
    let Some(id) = id else {
        return Audio3dError::invalid_parameter("null object id").code();
    };
    write_output(
        manager.object_reserve(PortId(port_id)).map(|object| object.0),
        Some(id),
    )
}

pub fn sce_audio3d_object_unreserve<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    object_id: u32,
) -> i32 {
    log::debug!(
        "sceAudio3dObjectUnreserve(port_id = {}, object_id = {})",
        port_id,
        object_id
    );
    status(manager.object_unreserve(PortId(port_id), ObjectId(object_id)))
}

/// Sets the first `num_attributes` entries of `attributes` on an object.
///
/// Unknown ports and objects are reported before malformed attributes.
pub fn sce_audio3d_object_set_attributes<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    object_id: u32,
    num_attributes: usize,
    attributes: Option<&[RawAttribute<'_>]>,
) -> i32 {
    log::debug!(
        "sceAudio3dObjectSetAttributes(port_id = {}, object_id = {}, num_attributes = {})",
        port_id,
        object_id,
        num_attributes
    );
    let (port_id, object_id) = (PortId(port_id), ObjectId(object_id));

    let raw = match attributes {
        Some(attributes) if num_attributes <= attributes.len() => &attributes[..num_attributes],
        Some(attributes) => {
            return status(locate_object(manager, port_id, object_id).and(Err(
                Audio3dError::invalid_parameter(format!(
                    "{num_attributes} attributes requested, {} given",
                    attributes.len()
                )),
            )));
        }
        None => &[],
    };

    let converted: Result<Vec<Attribute>> = raw.iter().map(Attribute::try_from).collect();
    let result = match converted {
        Ok(attributes) => manager.object_set_attributes(port_id, object_id, &attributes),
        Err(e) => locate_object(manager, port_id, object_id).and(Err(e)),
    };
    status(result)
}

fn locate_object<D: AudioOutDevice>(
    manager: &Audio3dManager<D>,
    port_id: PortId,
    object_id: ObjectId,
) -> Result<()> {
    manager
        .port(port_id)?
        .object(object_id)
        .map(|_| ())
        .ok_or(Audio3dError::InvalidObject)
}

pub fn sce_audio3d_bed_write<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    num_channels: u32,
    format: u32,
    buffer: Option<&[u8]>,
    num_samples: u32,
) -> i32 {
    sce_audio3d_bed_write2(
        manager,
        port_id,
        num_channels,
        format,
        buffer,
        num_samples,
        OutputRoute::Both as u32,
        false,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn sce_audio3d_bed_write2<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    num_channels: u32,
    format: u32,
    buffer: Option<&[u8]>,
    num_samples: u32,
    output_route: u32,
    restricted: bool,
) -> i32 {
    log::debug!(
        "sceAudio3dBedWrite2(port_id = {}, num_channels = {}, format = {}, num_samples = {}, output_route = {}, restricted = {})",
        port_id,
        num_channels,
        format,
        num_samples,
        output_route,
        restricted
    );

    let buffer = buffer.unwrap_or_default();
    let Some(format) = BedFormat::from_raw(format) else {
        return status(manager.unusable_bed(format!("unknown format {format}")));
    };

    let write = BedWrite::new(num_channels, format, buffer, num_samples).restricted(restricted);
    let result = match OutputRoute::try_from(output_route) {
        Ok(route) => manager.bed_write2(PortId(port_id), write.output_route(route)),
        // The route is checked after the guard and the buffer.
        Err(e) if write.passes_guard() => {
            if manager.is_initialized() {
                write.payload().and(Err(e))
            } else {
                Err(Audio3dError::NotReady)
            }
        }
        Err(_) => manager.bed_write2(PortId(port_id), write),
    };
    status(result)
}

pub fn sce_audio3d_port_advance<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
) -> i32 {
    log::debug!("sceAudio3dPortAdvance(port_id = {})", port_id);
    status(manager.port_advance(PortId(port_id)))
}

pub fn sce_audio3d_port_push<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    blocking: u32,
) -> i32 {
    log::debug!("sceAudio3dPortPush(port_id = {}, blocking = {})", port_id, blocking);
    let port_id = PortId(port_id);
    let result = manager
        .port(port_id)
        .and_then(|_| Blocking::try_from(blocking))
        .and_then(|blocking| manager.port_push(port_id, blocking));
    status(result)
}

/// Writes the queue level and the remaining advisory capacity. Either output may be null,
/// but not both.
pub fn sce_audio3d_port_get_queue_level<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    queue_level: Option<&mut u32>,
    queue_available: Option<&mut u32>,
) -> i32 {
    log::debug!("sceAudio3dPortGetQueueLevel(port_id = {})", port_id);

    let level = match manager.port_get_queue_level(PortId(port_id)) {
        Ok(level) => level,
        Err(e) => return e.code(),
    };
    if queue_level.is_none() && queue_available.is_none() {
        return Audio3dError::invalid_parameter("both outputs are null").code();
    }
    if let Some(out) = queue_level {
        *out = level.level;
    }
    if let Some(out) = queue_available {
        *out = level.available;
    }
    ORBIS_OK
}

/// Opens an output stream for a port. Returns the stream handle, or an error code.
#[allow(clippy::too_many_arguments)]
pub fn sce_audio3d_audio_out_open<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    user_id: i32,
    port_type: i32,
    index: i32,
    len: u32,
    freq: u32,
    param: u32,
) -> i32 {
    log::debug!(
        "sceAudio3dAudioOutOpen(port_id = {}, user_id = {}, type = {}, index = {}, len = {}, freq = {}, param = {:#x})",
        port_id,
        user_id,
        port_type,
        index,
        len,
        freq,
        param
    );

    let port_id = PortId(port_id);
    let result = manager
        .port(port_id)
        .and_then(|_| AudioOutPortType::try_from(port_type))
        .and_then(|port_type| {
            manager.audio_out_open(
                port_id,
                StreamParams {
                    user_id,
                    port_type,
                    index,
                    len,
                    freq,
                    param: AudioOutParam(param),
                },
            )
        });
    match result {
        Ok(AudioOutHandle(handle)) => handle,
        Err(e) => e.code(),
    }
}

pub fn sce_audio3d_audio_out_output<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    port_id: u32,
    pcm: Option<&[u8]>,
) -> i32 {
    log::debug!("sceAudio3dAudioOutOutput(port_id = {})", port_id);
    status(manager.audio_out_output(PortId(port_id), pcm.unwrap_or_default()))
}

pub fn sce_audio3d_audio_out_outputs<D: AudioOutDevice>(
    manager: &mut Audio3dManager<D>,
    params: Option<&[OutputParam<'_>]>,
    num: usize,
) -> i32 {
    log::debug!("sceAudio3dAudioOutOutputs(num = {})", num);
    let result = match params {
        Some(params) if num <= params.len() => manager.audio_out_outputs(&params[..num]),
        _ => Err(Audio3dError::invalid_parameter("output batch is null or short")),
    };
    status(result)
}

macro_rules! placeholders {
    ($($name:ident => $symbol:literal,)*) => {
        $(
            #[doc = concat!("`", $symbol, "`: accepted and ignored.")]
            pub fn $name() -> i32 {
                log::warn!("{} is not implemented, returning OK", $symbol);
                ORBIS_OK
            }
        )*

        /// Names of every entry point that is accepted and ignored.
        pub const PLACEHOLDERS: &[&str] = &[$($symbol,)*];
    };
}

placeholders! {
    sce_audio3d_audio_out_close => "sceAudio3dAudioOutClose",
    sce_audio3d_create_speaker_array => "sceAudio3dCreateSpeakerArray",
    sce_audio3d_delete_speaker_array => "sceAudio3dDeleteSpeakerArray",
    sce_audio3d_get_default_open_parameters => "sceAudio3dGetDefaultOpenParameters",
    sce_audio3d_get_speaker_array_memory_size => "sceAudio3dGetSpeakerArrayMemorySize",
    sce_audio3d_get_speaker_array_mix_coefficients => "sceAudio3dGetSpeakerArrayMixCoefficients",
    sce_audio3d_get_speaker_array_mix_coefficients2 => "sceAudio3dGetSpeakerArrayMixCoefficients2",
    sce_audio3d_port_create => "sceAudio3dPortCreate",
    sce_audio3d_port_destroy => "sceAudio3dPortDestroy",
    sce_audio3d_port_flush => "sceAudio3dPortFlush",
    sce_audio3d_port_free_state => "sceAudio3dPortFreeState",
    sce_audio3d_port_get_attributes_supported => "sceAudio3dPortGetAttributesSupported",
    sce_audio3d_port_get_list => "sceAudio3dPortGetList",
    sce_audio3d_port_get_parameters => "sceAudio3dPortGetParameters",
    sce_audio3d_port_get_state => "sceAudio3dPortGetState",
    sce_audio3d_port_get_status => "sceAudio3dPortGetStatus",
    sce_audio3d_port_query_debug => "sceAudio3dPortQueryDebug",
    sce_audio3d_port_set_attribute => "sceAudio3dPortSetAttribute",
    sce_audio3d_report_register_handler => "sceAudio3dReportRegisterHandler",
    sce_audio3d_report_unregister_handler => "sceAudio3dReportUnregisterHandler",
    sce_audio3d_set_gpu_renderer => "sceAudio3dSetGpuRenderer",
    sce_audio3d_str_error => "sceAudio3dStrError",
}
