//! Append-only record of the pointer samples a stroke consumed.
//!
//! Samples are stored in their fixed [`StrokeSample`] layout so a log can be
//! exported as raw bytes and fed back through a session to re-drive the
//! same stroke.

use crate::error::{Result, SculptError};
use crate::stroke::StrokeSample;

/// Samples of one stroke, in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayLog {
    stroke_id: u32,
    samples: Vec<StrokeSample>,
}

impl ReplayLog {
    pub fn new(stroke_id: u32) -> Self {
        Self {
            stroke_id,
            samples: Vec::new(),
        }
    }

    pub fn stroke_id(&self) -> u32 {
        self.stroke_id
    }

    pub fn push(&mut self, sample: StrokeSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[StrokeSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw sample records, native endianness
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.samples).to_vec()
    }

    /// Decode records written by [`ReplayLog::to_bytes`].
    ///
    /// The byte slice needs no particular alignment but must hold a whole
    /// number of records.
    pub fn from_bytes(stroke_id: u32, bytes: &[u8]) -> Result<Self> {
        let record = std::mem::size_of::<StrokeSample>();
        if bytes.len() % record != 0 {
            return Err(SculptError::ReplayLength {
                len: bytes.len(),
                record,
            });
        }
        let samples = bytes
            .chunks_exact(record)
            .map(bytemuck::pod_read_unaligned::<StrokeSample>)
            .collect();
        Ok(Self { stroke_id, samples })
    }
}
