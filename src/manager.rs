use crate::attribute::Attribute;
use crate::bed::{BedFormat, BedWrite};
use crate::config::{Audio3dDesc, BedGuardPolicy, PortParameters};
use crate::device::{AudioOutDevice, AudioOutHandle, Blocking, OutputParam, StreamParams};
use crate::error::{Audio3dError, Result};
use crate::port::{ObjectId, Port, PortId};
use crate::queue::{BedEntry, QueueEntry};
use std::collections::BTreeMap;

/// Occupancy of a port's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLevel {
    /// Entries currently queued.
    pub level: u32,
    /// `queue_depth - level`. Wraps when the advisory depth has been exceeded.
    pub available: u32,
}

/// State that exists between `initialize` and `terminate`.
#[derive(Debug)]
struct Context {
    ports: BTreeMap<PortId, Port>,
    next_port_id: u32,
}

impl Context {
    fn new() -> Self {
        Self {
            ports: BTreeMap::new(),
            next_port_id: 1,
        }
    }

    fn port(&self, id: PortId) -> Result<&Port> {
        self.ports.get(&id).ok_or_else(|| {
            log::debug!("{} is not open", id);
            Audio3dError::InvalidPort
        })
    }

    fn port_mut(&mut self, id: PortId) -> Result<&mut Port> {
        self.ports.get_mut(&id).ok_or_else(|| {
            log::debug!("{} is not open", id);
            Audio3dError::InvalidPort
        })
    }
}

fn ready(context: &Option<Context>) -> Result<&Context> {
    context.as_ref().ok_or(Audio3dError::NotReady)
}

fn ready_mut(context: &mut Option<Context>) -> Result<&mut Context> {
    context.as_mut().ok_or(Audio3dError::NotReady)
}

/// Owns every Audio3D port, object and queue.
///
/// `Audio3dManager` is the single handle through which the Audio3D library is driven.
/// It starts uninitialized; [`initialize`](Self::initialize) creates the port tables and
/// [`terminate`](Self::terminate) drops them again. Audio leaves the manager only through
/// the [`AudioOutDevice`] it was built with.
///
/// # Threading
///
/// Every operation takes `&mut self` and none of them lock. Share a manager between
/// threads by wrapping it in a single `Mutex`.
///
/// # Example
///
/// ```
/// use audio3d::{Attribute, Audio3dDesc, Audio3dManager, Blocking, MemoryAudioOut, PortParameters};
///
/// let mut manager = Audio3dManager::new(Audio3dDesc::default(), MemoryAudioOut::new());
/// manager.initialize(0)?;
///
/// let port = manager.port_open(1, &PortParameters::default())?;
/// let object = manager.object_reserve(port)?;
/// manager.object_set_attributes(port, object, &[Attribute::gain(0.8)])?;
/// assert_eq!(manager.port_get_queue_level(port)?.level, 1);
///
/// manager.port_push(port, Blocking::Sync)?;
/// assert_eq!(manager.port_get_queue_level(port)?.level, 0);
/// # Ok::<(), audio3d::Audio3dError>(())
/// ```
pub struct Audio3dManager<D: AudioOutDevice> {
    desc: Audio3dDesc,
    device: D,
    context: Option<Context>,
}

impl<D: AudioOutDevice> Audio3dManager<D> {
    pub fn new(desc: Audio3dDesc, device: D) -> Self {
        Self {
            desc,
            device,
            context: None,
        }
    }

    pub fn desc(&self) -> &Audio3dDesc {
        &self.desc
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Creates the port tables and prepares the output device.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `reserved` is not 0, `NotReady` if already initialized.
    pub fn initialize(&mut self, reserved: i64) -> Result<()> {
        if reserved != 0 {
            return Err(Audio3dError::invalid_parameter(format!(
                "reserved must be 0, got {reserved}"
            )));
        }
        if self.context.is_some() {
            log::debug!("Audio3d is already initialized");
            return Err(Audio3dError::NotReady);
        }

        self.device.initialize()?;
        self.context = Some(Context::new());
        log::info!("Audio3d initialized");
        Ok(())
    }

    /// Releases every port, object and queue, closing their output streams.
    pub fn terminate(&mut self) -> Result<()> {
        let context = self.context.take().ok_or(Audio3dError::NotReady)?;

        for (port_id, mut port) in context.ports {
            if let Some(handle) = port.take_audio_out() {
                if let Err(e) = self.device.close(handle) {
                    log::warn!("Failed to close {} of {}: {}", handle, port_id, e);
                }
            }
        }

        log::info!("Audio3d terminated");
        Ok(())
    }

    /// Opens a port and returns its id.
    ///
    /// Parameters are validated before the initialization check, so malformed
    /// parameters report `InvalidParameter` even on an uninitialized manager.
    pub fn port_open(&mut self, user_id: i32, parameters: &PortParameters) -> Result<PortId> {
        if let Err(e) = parameters.validate() {
            log::debug!("port_open rejected {:?}: {}", parameters, e);
            return Err(e);
        }
        let context = ready_mut(&mut self.context)?;

        let id = PortId(context.next_port_id);
        context.next_port_id += 1;
        context.ports.insert(id, Port::new(user_id, parameters.clone()));

        log::info!(
            "Opened {} for user {} (granularity: {}, max_objects: {}, queue_depth: {}, mode: {:?})",
            id,
            user_id,
            parameters.granularity,
            parameters.max_objects,
            parameters.queue_depth,
            parameters.buffer_mode
        );
        Ok(id)
    }

    /// Closes a port, dropping its objects and queued entries.
    pub fn port_close(&mut self, port_id: PortId) -> Result<()> {
        let context = ready_mut(&mut self.context)?;
        let mut port = context.ports.remove(&port_id).ok_or_else(|| {
            log::debug!("port_close: {} is not open", port_id);
            Audio3dError::InvalidPort
        })?;

        if let Some(handle) = port.take_audio_out() {
            if let Err(e) = self.device.close(handle) {
                log::warn!("Failed to close {} of {}: {}", handle, port_id, e);
            }
        }

        log::info!(
            "Closed {} ({} objects, {} queued entries dropped)",
            port_id,
            port.object_count(),
            port.queue().len()
        );
        Ok(())
    }

    /// Read access to an open port.
    pub fn port(&self, port_id: PortId) -> Result<&Port> {
        ready(&self.context)?.port(port_id)
    }

    /// Ids of every open port, in opening order.
    pub fn port_ids(&self) -> Vec<PortId> {
        self.context
            .as_ref()
            .map(|context| context.ports.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Reserves an object on a port.
    ///
    /// # Errors
    ///
    /// `OutOfResources` once the port holds `max_objects` live objects.
    pub fn object_reserve(&mut self, port_id: PortId) -> Result<ObjectId> {
        let port = ready_mut(&mut self.context)?.port_mut(port_id)?;
        let id = port.reserve_object().inspect_err(|_| {
            log::debug!(
                "{} is at its limit of {} objects",
                port_id,
                port.parameters().max_objects
            );
        })?;
        log::debug!("Reserved {} on {}", id, port_id);
        Ok(id)
    }

    /// Appends attributes to an object and queues them as one render unit.
    pub fn object_set_attributes(
        &mut self,
        port_id: PortId,
        object_id: ObjectId,
        attributes: &[Attribute],
    ) -> Result<()> {
        let port = ready_mut(&mut self.context)?.port_mut(port_id)?;
        if port.object(object_id).is_none() {
            log::debug!("{} is not reserved on {}", object_id, port_id);
            return Err(Audio3dError::InvalidObject);
        }
        if attributes.is_empty() {
            return Err(Audio3dError::invalid_parameter("no attributes given"));
        }

        for attribute in attributes {
            log::debug!(
                "Setting {:?} ({} bytes) on {} of {}",
                attribute.id(),
                attribute.value_size(),
                object_id,
                port_id
            );
        }
        port.append_attributes(object_id, attributes)?;
        port.queue_mut().push(QueueEntry::Object {
            object_id,
            attributes: attributes.to_vec(),
        });
        Ok(())
    }

    /// Releases an object.
    ///
    /// Entries it already queued stay queued unless
    /// [`Audio3dDesc::purge_queue_on_unreserve`] is set.
    pub fn object_unreserve(&mut self, port_id: PortId, object_id: ObjectId) -> Result<()> {
        let purge = self.desc.purge_queue_on_unreserve;
        let port = ready_mut(&mut self.context)?.port_mut(port_id)?;
        port.unreserve_object(object_id).inspect_err(|_| {
            log::debug!("{} is not reserved on {}", object_id, port_id);
        })?;

        if purge {
            let dropped = port.queue_mut().purge_object(object_id);
            log::debug!(
                "Unreserved {} on {}, purged {} queued entries",
                object_id,
                port_id,
                dropped
            );
        } else {
            log::debug!("Unreserved {} on {}", object_id, port_id);
        }
        Ok(())
    }

    /// Queues a bed audible on every output. See [`bed_write2`](Self::bed_write2).
    pub fn bed_write(
        &mut self,
        port_id: PortId,
        num_channels: u32,
        format: BedFormat,
        buffer: &[u8],
        num_samples: u32,
    ) -> Result<()> {
        self.bed_write2(port_id, BedWrite::new(num_channels, format, buffer, num_samples))
    }

    /// Queues raw bed PCM on a port.
    ///
    /// A write with an unsupported channel count, an empty buffer or no samples is
    /// handled according to [`Audio3dDesc::bed_guard_policy`]. Otherwise the buffer must
    /// be aligned for its format and long enough for `num_samples * num_channels`
    /// samples; exactly that many bytes are copied into the queue.
    pub fn bed_write2(&mut self, port_id: PortId, write: BedWrite<'_>) -> Result<()> {
        log::debug!(
            "bed_write2: {}, num_channels = {}, format = {:?}, num_samples = {}, output_route = {:?}, restricted = {}",
            port_id,
            write.num_channels,
            write.format,
            write.num_samples,
            write.output_route,
            write.restricted
        );

        if !write.passes_guard() {
            return self.unusable_bed(format!(
                "{} channels, {} bytes, {} samples",
                write.num_channels,
                write.buffer.len(),
                write.num_samples
            ));
        }

        let context = ready_mut(&mut self.context)?;
        let pcm = write.payload().inspect_err(|e| log::debug!("bed_write2: {}", e))?;
        let port = context.port_mut(port_id)?;
        port.queue_mut().push(QueueEntry::Bed(BedEntry {
            pcm: pcm.to_vec(),
            num_channels: write.num_channels,
            format: write.format,
            num_samples: write.num_samples,
            output_route: write.output_route,
            restricted: write.restricted,
        }));
        Ok(())
    }

    /// Outcome of a bed write that failed the channel/buffer/sample guard.
    pub(crate) fn unusable_bed(&self, detail: String) -> Result<()> {
        ready(&self.context)?;
        match self.desc.bed_guard_policy {
            BedGuardPolicy::Ignore => {
                log::debug!("bed_write2: unusable bed ({}), ignoring write", detail);
                Ok(())
            }
            BedGuardPolicy::Reject => Err(Audio3dError::invalid_parameter(format!(
                "unusable bed ({detail})"
            ))),
        }
    }

    /// Retires the oldest queued unit without producing audio.
    pub fn port_advance(&mut self, port_id: PortId) -> Result<()> {
        let port = ready_mut(&mut self.context)?.port_mut(port_id)?;
        if !port.parameters().buffer_mode.can_advance() {
            log::debug!("{} does not advance", port_id);
            return Err(Audio3dError::NotSupported);
        }

        if port.queue_mut().pop().is_none() {
            log::debug!("port_advance: {} queue is empty", port_id);
        }
        Ok(())
    }

    /// Retires the oldest queued unit and forwards its PCM to the port's output stream.
    ///
    /// A bed forwards its buffer. An object entry forwards the value of each PCM
    /// attribute it carries, in order; other attributes are not forwarded. The entry is
    /// retired even when it carries no PCM, when no stream is bound, or when the
    /// device rejects a buffer (the device error is returned).
    pub fn port_push(&mut self, port_id: PortId, blocking: Blocking) -> Result<()> {
        let port = ready_mut(&mut self.context)?.port_mut(port_id)?;
        if !port.parameters().buffer_mode.can_push() {
            log::debug!("{} does not push", port_id);
            return Err(Audio3dError::NotSupported);
        }

        let Some(entry) = port.queue_mut().pop() else {
            log::debug!("port_push: {} queue is empty", port_id);
            return Ok(());
        };

        if let Some(object_id) = entry.object_id() {
            if port.object(object_id).is_none() {
                log::debug!(
                    "port_push: {} was unreserved after queuing, forwarding its snapshot",
                    object_id
                );
            }
        }

        let Some(handle) = port.audio_out_handle() else {
            log::warn!("port_push: {} has no audio out stream, dropping unit", port_id);
            return Ok(());
        };

        let buffers = entry.pcm_buffers();
        if buffers.is_empty() {
            log::debug!("port_push: unit on {} carries no PCM", port_id);
        }
        for pcm in buffers {
            self.device.output(handle, pcm, blocking)?;
        }
        Ok(())
    }

    /// Reports how full a port's queue is.
    pub fn port_get_queue_level(&self, port_id: PortId) -> Result<QueueLevel> {
        let port = ready(&self.context)?.port(port_id)?;
        let level = port.queue().len() as u32;
        Ok(QueueLevel {
            level,
            available: port.parameters().queue_depth.wrapping_sub(level),
        })
    }

    /// Opens an output stream for a port and binds it.
    ///
    /// `params.len` must equal the port's granularity. A stream already bound to the
    /// port is closed and replaced.
    pub fn audio_out_open(&mut self, port_id: PortId, params: StreamParams) -> Result<AudioOutHandle> {
        let port = ready_mut(&mut self.context)?.port_mut(port_id)?;
        let granularity = port.parameters().granularity;
        if params.len != granularity {
            return Err(Audio3dError::invalid_parameter(format!(
                "len {} does not match granularity {} of {}",
                params.len, granularity, port_id
            )));
        }

        let handle = self.device.open(&params).inspect_err(|e| {
            log::error!("Failed to open audio out for {}: {}", port_id, e);
        })?;
        if let Some(previous) = port.bind_audio_out(handle) {
            if let Err(e) = self.device.close(previous) {
                log::warn!("Failed to close {} of {}: {}", previous, port_id, e);
            }
        }

        log::info!("Bound {} to {}", handle, port_id);
        Ok(handle)
    }

    /// Sends a buffer straight to a port's output stream, bypassing its queue.
    pub fn audio_out_output(&mut self, port_id: PortId, pcm: &[u8]) -> Result<()> {
        let port = ready(&self.context)?.port(port_id)?;
        let handle = port.audio_out_handle().ok_or_else(|| {
            log::debug!("audio_out_output: {} has no audio out stream", port_id);
            Audio3dError::InvalidPort
        })?;
        if pcm.is_empty() {
            return Err(Audio3dError::invalid_parameter("empty output buffer"));
        }
        self.device.output(handle, pcm, Blocking::Sync)
    }

    /// Sends one buffer to each of several output streams.
    pub fn audio_out_outputs(&mut self, params: &[OutputParam<'_>]) -> Result<()> {
        ready(&self.context)?;
        if params.is_empty() || params.iter().any(|param| param.pcm.is_empty()) {
            return Err(Audio3dError::invalid_parameter("empty output batch"));
        }
        self.device.output_multi(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeId;
    use crate::bed::OutputRoute;
    use crate::config::BufferMode;
    use crate::device::{AudioOutFormat, AudioOutParam, AudioOutPortType, MemoryAudioOut};

    fn manager_with(desc: Audio3dDesc) -> Audio3dManager<MemoryAudioOut> {
        let mut manager = Audio3dManager::new(desc, MemoryAudioOut::new());
        manager.initialize(0).unwrap();
        manager
    }

    fn manager() -> Audio3dManager<MemoryAudioOut> {
        manager_with(Audio3dDesc::default())
    }

    fn stream(len: u32) -> StreamParams {
        StreamParams {
            user_id: 1,
            port_type: AudioOutPortType::Main,
            index: 0,
            len,
            freq: 48000,
            param: AudioOutParam::from_format(AudioOutFormat::FloatStereo),
        }
    }

    /// Returns `len` bytes starting on a 4-byte boundary.
    fn aligned(storage: &[u8], len: usize) -> &[u8] {
        let offset = storage.as_ptr().align_offset(4);
        &storage[offset..offset + len]
    }

    fn level(manager: &Audio3dManager<MemoryAudioOut>, port: PortId) -> u32 {
        manager.port_get_queue_level(port).unwrap().level
    }

    #[test]
    fn lifecycle() {
        let mut manager = Audio3dManager::new(Audio3dDesc::default(), MemoryAudioOut::new());
        assert_eq!(manager.terminate(), Err(Audio3dError::NotReady));
        assert!(matches!(
            manager.initialize(1),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert_eq!(manager.initialize(0), Ok(()));
        assert!(manager.device().is_initialized());
        assert_eq!(manager.initialize(0), Err(Audio3dError::NotReady));
        assert_eq!(manager.terminate(), Ok(()));
        assert_eq!(manager.initialize(0), Ok(()));
    }

    #[test]
    fn operations_need_initialization() {
        let mut manager = Audio3dManager::new(Audio3dDesc::default(), MemoryAudioOut::new());
        assert_eq!(
            manager.port_open(0, &PortParameters::default()),
            Err(Audio3dError::NotReady)
        );
        assert!(matches!(
            manager.port_open(0, &PortParameters::new().granularity(255)),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert_eq!(manager.object_reserve(PortId(1)), Err(Audio3dError::NotReady));
        assert_eq!(manager.port_advance(PortId(1)), Err(Audio3dError::NotReady));
        assert_eq!(
            manager.port_get_queue_level(PortId(1)),
            Err(Audio3dError::NotReady)
        );
    }

    #[test]
    fn port_ids_are_fresh() {
        let mut manager = manager();
        let mut seen = Vec::new();
        for granularity in [256, 512, 1024] {
            let id = manager
                .port_open(0, &PortParameters::new().granularity(granularity))
                .unwrap();
            assert!(!seen.contains(&id));
            seen.push(id);
        }
        manager.port_close(seen[2]).unwrap();
        let next = manager.port_open(0, &PortParameters::default()).unwrap();
        assert!(!seen.contains(&next));
        assert_eq!(manager.port_ids(), vec![seen[0], seen[1], next]);
    }

    #[test]
    fn port_open_granularity_boundary() {
        let mut manager = manager();
        assert!(matches!(
            manager.port_open(0, &PortParameters::new().granularity(255)),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert!(manager.port_open(0, &PortParameters::new().granularity(256)).is_ok());
    }

    #[test]
    fn closed_port_is_invalid() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        manager.port_close(port).unwrap();

        assert_eq!(manager.port_close(port), Err(Audio3dError::InvalidPort));
        assert_eq!(manager.object_reserve(port), Err(Audio3dError::InvalidPort));
        assert_eq!(manager.port_advance(port), Err(Audio3dError::InvalidPort));
        assert_eq!(manager.port_push(port, Blocking::Sync), Err(Audio3dError::InvalidPort));
        assert_eq!(
            manager.port_get_queue_level(port),
            Err(Audio3dError::InvalidPort)
        );
        assert_eq!(
            manager.audio_out_open(port, stream(256)),
            Err(Audio3dError::InvalidPort)
        );
    }

    #[test]
    fn object_reservation_capacity() {
        let mut manager = manager();
        let port = manager
            .port_open(0, &PortParameters::new().max_objects(3))
            .unwrap();
        for expected in 1..=3 {
            assert_eq!(manager.object_reserve(port), Ok(ObjectId(expected)));
        }
        assert_eq!(manager.object_reserve(port), Err(Audio3dError::OutOfResources));
        assert_eq!(manager.port(port).unwrap().object_count(), 3);

        manager.object_unreserve(port, ObjectId(2)).unwrap();
        assert_eq!(manager.object_reserve(port), Ok(ObjectId(4)));
    }

    #[test]
    fn set_attributes_validation() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let object = manager.object_reserve(port).unwrap();

        assert!(matches!(
            manager.object_set_attributes(port, object, &[]),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert_eq!(
            manager.object_set_attributes(port, ObjectId(99), &[Attribute::gain(1.0)]),
            Err(Audio3dError::InvalidObject)
        );
        assert_eq!(
            manager.object_set_attributes(PortId(99), object, &[Attribute::gain(1.0)]),
            Err(Audio3dError::InvalidPort)
        );
        assert_eq!(level(&manager, port), 0);
    }

    #[test]
    fn set_attributes_queues_one_entry_per_call() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let object = manager.object_reserve(port).unwrap();

        manager
            .object_set_attributes(port, object, &[Attribute::gain(1.0), Attribute::spread(0.5)])
            .unwrap();
        manager
            .object_set_attributes(port, object, &[Attribute::gain(0.25)])
            .unwrap();

        let port_ref = manager.port(port).unwrap();
        assert_eq!(port_ref.queue().len(), 2);
        assert_eq!(port_ref.object(object).unwrap().attributes().len(), 3);
        let snapshot_sizes: Vec<usize> = port_ref
            .queue()
            .iter()
            .map(|entry| match entry {
                QueueEntry::Object { attributes, .. } => attributes.len(),
                QueueEntry::Bed(_) => 0,
            })
            .collect();
        assert_eq!(snapshot_sizes, vec![2, 1]);
    }

    #[test]
    fn bed_write_queues_one_bed() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let storage = vec![7u8; 1024];
        let buffer = aligned(&storage, 800);

        let write = BedWrite::new(2, BedFormat::Float, buffer, 100).output_route(OutputRoute::Both);
        assert_eq!(manager.bed_write2(port, write), Ok(()));
        assert_eq!(level(&manager, port), 1);
        match manager.port(port).unwrap().queue().front() {
            Some(QueueEntry::Bed(bed)) => {
                assert_eq!(bed.pcm.len(), 800);
                assert_eq!(bed.num_channels, 2);
            }
            other => panic!("expected a bed entry, got {other:?}"),
        }
    }

    #[test]
    fn misaligned_bed_is_rejected() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let storage = vec![0u8; 1024];
        let buffer = aligned(&storage, 900);

        assert!(matches!(
            manager.bed_write(port, 2, BedFormat::Float, &buffer[1..], 100),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert!(matches!(
            manager.bed_write(port, 2, BedFormat::S16, &buffer[1..], 100),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert_eq!(manager.bed_write(port, 2, BedFormat::S16, &buffer[2..], 100), Ok(()));
        assert_eq!(level(&manager, port), 1);
    }

    #[test]
    fn bed_checks_port_after_arguments() {
        let mut manager = manager();
        let storage = vec![0u8; 1024];
        let buffer = aligned(&storage, 800);
        assert_eq!(
            manager.bed_write(PortId(42), 2, BedFormat::Float, buffer, 100),
            Err(Audio3dError::InvalidPort)
        );
        assert!(matches!(
            manager.bed_write(PortId(42), 2, BedFormat::Float, &buffer[2..], 100),
            Err(Audio3dError::InvalidParameter(_))
        ));
        // The guard runs before the port lookup too.
        assert_eq!(
            manager.bed_write(PortId(42), 5, BedFormat::Float, buffer, 100),
            Ok(())
        );
    }

    #[test]
    fn bed_guard_policy() {
        let storage = vec![0u8; 4096];
        let buffer = aligned(&storage, 2048);

        let mut lenient = manager();
        let port = lenient.port_open(0, &PortParameters::default()).unwrap();
        for channels in [0, 1, 3, 4, 7, 16] {
            assert_eq!(lenient.bed_write(port, channels, BedFormat::Float, buffer, 16), Ok(()));
        }
        assert_eq!(lenient.bed_write(port, 2, BedFormat::Float, buffer, 0), Ok(()));
        assert_eq!(level(&lenient, port), 0);

        let mut strict = manager_with(Audio3dDesc::new().bed_guard_policy(BedGuardPolicy::Reject));
        let port = strict.port_open(0, &PortParameters::default()).unwrap();
        assert!(matches!(
            strict.bed_write(port, 3, BedFormat::Float, buffer, 16),
            Err(Audio3dError::InvalidParameter(_))
        ));
        assert_eq!(strict.bed_write(port, 24, BedFormat::Float, buffer, 16), Ok(()));
        assert_eq!(level(&strict, port), 1);
    }

    #[test]
    fn advance_respects_buffer_mode() {
        let mut manager = manager();
        let storage = vec![0u8; 1024];
        let buffer = aligned(&storage, 800);

        let no_advance = manager
            .port_open(0, &PortParameters::new().buffer_mode(BufferMode::NoAdvance))
            .unwrap();
        assert_eq!(manager.port_advance(no_advance), Err(Audio3dError::NotSupported));
        manager.bed_write(no_advance, 2, BedFormat::Float, buffer, 100).unwrap();
        assert_eq!(manager.port_advance(no_advance), Err(Audio3dError::NotSupported));
        assert_eq!(
            manager.port_push(no_advance, Blocking::Sync),
            Err(Audio3dError::NotSupported)
        );
        assert_eq!(level(&manager, no_advance), 1);

        let no_push = manager
            .port_open(0, &PortParameters::new().buffer_mode(BufferMode::AdvanceNoPush))
            .unwrap();
        manager.bed_write(no_push, 2, BedFormat::Float, buffer, 100).unwrap();
        assert_eq!(
            manager.port_push(no_push, Blocking::Sync),
            Err(Audio3dError::NotSupported)
        );
        assert_eq!(manager.port_advance(no_push), Ok(()));
        assert_eq!(level(&manager, no_push), 0);
        assert!(manager.device().outputs().is_empty());
    }

    #[test]
    fn empty_queue_is_not_an_error() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        assert_eq!(manager.port_advance(port), Ok(()));
        assert_eq!(manager.port_push(port, Blocking::Async), Ok(()));
        assert_eq!(level(&manager, port), 0);
    }

    #[test]
    fn push_forwards_bed_once() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let handle = manager.audio_out_open(port, stream(256)).unwrap();
        let storage: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let buffer = aligned(&storage, 800);

        manager.bed_write(port, 2, BedFormat::Float, buffer, 100).unwrap();
        manager.port_push(port, Blocking::Sync).unwrap();

        let outputs = manager.device().outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].handle, handle);
        assert_eq!(outputs[0].pcm, buffer);
        assert_eq!(outputs[0].blocking, Blocking::Sync);
        assert_eq!(level(&manager, port), 0);

        manager.port_push(port, Blocking::Sync).unwrap();
        assert_eq!(manager.device().outputs().len(), 1);
    }

    #[test]
    fn push_forwards_only_pcm_attributes() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        manager.audio_out_open(port, stream(256)).unwrap();
        let object = manager.object_reserve(port).unwrap();

        manager
            .object_set_attributes(
                port,
                object,
                &[
                    Attribute::pcm(&[1, 1, 1, 1]),
                    Attribute::gain(0.5),
                    Attribute::new(AttributeId::Priority, &[9, 9, 9, 9]),
                    Attribute::pcm(&[2, 2, 2, 2]),
                ],
            )
            .unwrap();
        manager
            .object_set_attributes(port, object, &[Attribute::gain(1.0)])
            .unwrap();

        manager.port_push(port, Blocking::Async).unwrap();
        manager.port_push(port, Blocking::Async).unwrap();

        let forwarded: Vec<Vec<u8>> = manager
            .device_mut()
            .take_outputs()
            .into_iter()
            .map(|record| record.pcm)
            .collect();
        assert_eq!(forwarded, vec![vec![1, 1, 1, 1], vec![2, 2, 2, 2]]);
        assert_eq!(level(&manager, port), 0);
    }

    #[test]
    fn push_without_stream_retires_unit() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let object = manager.object_reserve(port).unwrap();
        manager
            .object_set_attributes(port, object, &[Attribute::pcm(&[0; 8])])
            .unwrap();
        assert_eq!(manager.port_push(port, Blocking::Sync), Ok(()));
        assert_eq!(level(&manager, port), 0);
        assert!(manager.device().outputs().is_empty());
    }

    #[test]
    fn unreserve_keeps_queued_entries_by_default() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        manager.audio_out_open(port, stream(256)).unwrap();
        let object = manager.object_reserve(port).unwrap();
        manager
            .object_set_attributes(port, object, &[Attribute::pcm(&[5; 4])])
            .unwrap();

        manager.object_unreserve(port, object).unwrap();
        assert_eq!(
            manager.object_unreserve(port, object),
            Err(Audio3dError::InvalidObject)
        );
        assert_eq!(level(&manager, port), 1);

        manager.port_push(port, Blocking::Sync).unwrap();
        assert_eq!(manager.device().outputs()[0].pcm, vec![5; 4]);
    }

    #[test]
    fn unreserve_can_purge_queued_entries() {
        let mut manager = manager_with(Audio3dDesc::new().purge_queue_on_unreserve(true));
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        let keep = manager.object_reserve(port).unwrap();
        let drop = manager.object_reserve(port).unwrap();
        manager.object_set_attributes(port, drop, &[Attribute::gain(1.0)]).unwrap();
        manager.object_set_attributes(port, keep, &[Attribute::gain(1.0)]).unwrap();
        manager.object_set_attributes(port, drop, &[Attribute::gain(0.0)]).unwrap();

        manager.object_unreserve(port, drop).unwrap();
        let port_ref = manager.port(port).unwrap();
        assert_eq!(port_ref.queue().len(), 1);
        assert_eq!(port_ref.queue().front().and_then(QueueEntry::object_id), Some(keep));
    }

    #[test]
    fn queue_level_tracks_entries() {
        let mut manager = manager();
        let port = manager
            .port_open(0, &PortParameters::new().queue_depth(4))
            .unwrap();
        let object = manager.object_reserve(port).unwrap();

        for n in 1..=3u32 {
            manager.object_set_attributes(port, object, &[Attribute::gain(1.0)]).unwrap();
            assert_eq!(
                manager.port_get_queue_level(port),
                Ok(QueueLevel {
                    level: n,
                    available: 4 - n
                })
            );
        }

        // The depth is advisory: writes past it still queue.
        for _ in 0..2 {
            manager.object_set_attributes(port, object, &[Attribute::gain(1.0)]).unwrap();
        }
        let over = manager.port_get_queue_level(port).unwrap();
        assert_eq!(over.level, 5);
        assert_eq!(over.available, 4u32.wrapping_sub(5));
    }

    #[test]
    fn audio_out_open_requires_matching_len() {
        let mut manager = manager();
        let port = manager
            .port_open(0, &PortParameters::new().granularity(512))
            .unwrap();
        assert!(matches!(
            manager.audio_out_open(port, stream(256)),
            Err(Audio3dError::InvalidParameter(_))
        ));
        let first = manager.audio_out_open(port, stream(512)).unwrap();
        assert_eq!(manager.port(port).unwrap().audio_out_handle(), Some(first));

        let second = manager.audio_out_open(port, stream(512)).unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.device().open_stream_count(), 1);
    }

    #[test]
    fn audio_out_open_reports_device_error() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        manager.device_mut().fail_next_open(-5);
        assert_eq!(manager.audio_out_open(port, stream(256)).unwrap_err().code(), -5);
        assert_eq!(manager.port(port).unwrap().audio_out_handle(), None);
    }

    #[test]
    fn direct_output_bypasses_queue() {
        let mut manager = manager();
        let port = manager.port_open(0, &PortParameters::default()).unwrap();
        assert_eq!(
            manager.audio_out_output(port, &[1, 2]),
            Err(Audio3dError::InvalidPort)
        );

        let handle = manager.audio_out_open(port, stream(256)).unwrap();
        assert!(matches!(
            manager.audio_out_output(port, &[]),
            Err(Audio3dError::InvalidParameter(_))
        ));
        manager.audio_out_output(port, &[1, 2]).unwrap();
        assert_eq!(manager.device().outputs()[0].handle, handle);
        assert_eq!(level(&manager, port), 0);

        manager
            .audio_out_outputs(&[OutputParam { handle, pcm: &[3] }])
            .unwrap();
        assert_eq!(manager.device().outputs().len(), 2);
        assert!(manager.audio_out_outputs(&[]).is_err());
    }

    #[test]
    fn close_and_terminate_release_streams() {
        let mut manager = manager();
        let a = manager.port_open(0, &PortParameters::default()).unwrap();
        let b = manager.port_open(0, &PortParameters::default()).unwrap();
        manager.audio_out_open(a, stream(256)).unwrap();
        manager.audio_out_open(b, stream(256)).unwrap();
        assert_eq!(manager.device().open_stream_count(), 2);

        manager.port_close(a).unwrap();
        assert_eq!(manager.device().open_stream_count(), 1);

        manager.terminate().unwrap();
        assert_eq!(manager.device().open_stream_count(), 0);
        assert!(manager.port_ids().is_empty());

        manager.initialize(0).unwrap();
        assert_eq!(
            manager.port_open(0, &PortParameters::default()),
            Ok(PortId(1))
        );
    }
}
