//! Ports and the objects reserved on them.

use crate::attribute::Attribute;
use crate::config::PortParameters;
use crate::device::AudioOutHandle;
use crate::error::{Audio3dError, Result};
use crate::queue::PortQueue;
use std::collections::BTreeMap;

/// Handle of an open port. Never reused while the manager stays initialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PortId({})", self.0)
    }
}

/// Handle of an object, unique within its port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

/// A positional sound source reserved on a port.
#[derive(Debug, Default)]
pub struct AudioObject {
    attributes: Vec<Attribute>,
}

impl AudioObject {
    /// Every attribute set on this object, oldest first.
    ///
    /// PCM attributes are kept by id and size only; their samples live in the queued
    /// entry until it is pushed or advanced.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// One logical multi-object rendering stream.
#[derive(Debug)]
pub struct Port {
    user_id: i32,
    parameters: PortParameters,
    audio_out_handle: Option<AudioOutHandle>,
    objects: BTreeMap<ObjectId, AudioObject>,
    next_object_id: u32,
    queue: PortQueue,
}

impl Port {
    pub(crate) fn new(user_id: i32, parameters: PortParameters) -> Self {
        Self {
            user_id,
            parameters,
            audio_out_handle: None,
            objects: BTreeMap::new(),
            next_object_id: 1,
            queue: PortQueue::new(),
        }
    }

    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn parameters(&self) -> &PortParameters {
        &self.parameters
    }

    pub fn audio_out_handle(&self) -> Option<AudioOutHandle> {
        self.audio_out_handle
    }

    /// Binds a device handle, returning the one it replaces.
    pub(crate) fn bind_audio_out(&mut self, handle: AudioOutHandle) -> Option<AudioOutHandle> {
        self.audio_out_handle.replace(handle)
    }

    pub(crate) fn take_audio_out(&mut self) -> Option<AudioOutHandle> {
        self.audio_out_handle.take()
    }

    pub fn queue(&self) -> &PortQueue {
        &self.queue
    }

    pub(crate) fn queue_mut(&mut self) -> &mut PortQueue {
        &mut self.queue
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, id: ObjectId) -> Option<&AudioObject> {
        self.objects.get(&id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub(crate) fn reserve_object(&mut self) -> Result<ObjectId> {
        if self.objects.len() >= self.parameters.max_objects as usize {
            return Err(Audio3dError::OutOfResources);
        }
        let id = ObjectId(self.next_object_id);
        self.next_object_id += 1;
        self.objects.insert(id, AudioObject::default());
        Ok(id)
    }

    pub(crate) fn unreserve_object(&mut self, id: ObjectId) -> Result<()> {
        self.objects
            .remove(&id)
            .map(|_| ())
            .ok_or(Audio3dError::InvalidObject)
    }

    pub(crate) fn append_attributes(&mut self, id: ObjectId, attributes: &[Attribute]) -> Result<()> {
        let object = self.objects.get_mut(&id).ok_or(Audio3dError::InvalidObject)?;
        object
            .attributes
            .extend(attributes.iter().map(|attribute| {
                if attribute.is_pcm() {
                    attribute.without_value()
                } else {
                    attribute.clone()
                }
            }));
        Ok(())
    }
}
