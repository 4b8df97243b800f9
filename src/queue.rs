//! Per-port render queue.

use crate::attribute::Attribute;
use crate::bed::{BedFormat, OutputRoute};
use crate::port::ObjectId;
use std::collections::VecDeque;

/// Raw PCM submitted through a bed write.
#[derive(Debug, Clone, PartialEq)]
pub struct BedEntry {
    pub pcm: Vec<u8>,
    pub num_channels: u32,
    pub format: BedFormat,
    pub num_samples: u32,
    pub output_route: OutputRoute,
    /// Recorded for the mixer, not interpreted here.
    pub restricted: bool,
}

/// One unit of pending work on a port.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    Bed(BedEntry),
    /// Attributes set on an object in a single call.
    Object {
        object_id: ObjectId,
        attributes: Vec<Attribute>,
    },
}

impl QueueEntry {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Bed(_) => None,
            Self::Object { object_id, .. } => Some(*object_id),
        }
    }

    /// PCM buffers this entry forwards on push, in submission order.
    pub fn pcm_buffers(&self) -> Vec<&[u8]> {
        match self {
            Self::Bed(bed) => vec![bed.pcm.as_slice()],
            Self::Object { attributes, .. } => attributes
                .iter()
                .filter(|attribute| attribute.is_pcm())
                .map(Attribute::value)
                .collect(),
        }
    }
}

/// Strict FIFO of [`QueueEntry`].
#[derive(Debug, Default)]
pub struct PortQueue {
    entries: VecDeque<QueueEntry>,
}

impl PortQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every object entry for `object_id`, returning how many were dropped.
    pub fn purge_object(&mut self, object_id: ObjectId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.object_id() != Some(object_id));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}
