//! Chunk planning for session uploads.

use crate::FilesError;
use std::ops::Range;

/// Ordered, contiguous byte ranges covering a payload.
///
/// The first range starts at 0, each range starts where the previous one ended, and the
/// last range ends at the payload length. An empty payload yields a single empty range so
/// a session can still be started and finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    spans: Vec<Range<usize>>,
}

impl ChunkPlan {
    /// Plans chunks of at most `chunk_size` bytes over a payload of `total` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidChunkSize`] if `chunk_size` is zero.
    pub fn new(total: usize, chunk_size: u64) -> Result<Self, FilesError> {
        if chunk_size == 0 {
            return Err(FilesError::InvalidChunkSize(chunk_size));
        }
        let step = usize::try_from(chunk_size).unwrap_or(usize::MAX);

        if total == 0 {
            return Ok(Self { spans: vec![0..0] });
        }

        let mut spans = Vec::with_capacity(total.div_ceil(step));
        let mut start = 0;
        while start < total {
            let end = start.saturating_add(step).min(total);
            spans.push(start..end);
            start = end;
        }

        Ok(Self { spans })
    }

    /// Number of chunks in the plan.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Always false; a plan has at least one (possibly empty) chunk.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The planned byte ranges, in upload order.
    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }
}
