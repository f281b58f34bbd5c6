//! Run-length encoding of block sequences.
//!
//! A run is `length` consecutive cells holding the same `block`. Encoded
//! sequences are canonical: no zero-length runs and no two adjacent runs with
//! the same block, so decode-then-encode reproduces the input exactly.

use crate::registry::BlockId;

/// A single run: `length` consecutive occurrences of `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRun {
    /// The block stored in every cell of the run.
    pub block: BlockId,
    /// Number of consecutive cells (always >= 1 in canonical sequences).
    pub length: u32,
}

/// Errors that can occur during RLE decoding.
#[derive(Debug, thiserror::Error)]
pub enum RleError {
    /// Decoded length does not match expected length.
    #[error("RLE length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected number of cells.
        expected: usize,
        /// Actual number of decoded cells.
        actual: usize,
    },
}

/// Incremental encoder: cells are appended one at a time in iteration order
/// and folded into runs as they arrive.
#[derive(Debug, Default)]
pub struct RunEncoder {
    runs: Vec<BlockRun>,
    total: usize,
}

impl RunEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one cell.
    pub fn push(&mut self, block: BlockId) {
        self.push_run(block, 1);
    }

    /// Appends `length` cells of `block`. Zero-length appends are ignored.
    pub fn push_run(&mut self, block: BlockId, length: u32) {
        if length == 0 {
            return;
        }
        self.total += length as usize;
        match self.runs.last_mut() {
            Some(last) if last.block == block => last.length += length,
            _ => self.runs.push(BlockRun { block, length }),
        }
    }

    /// Number of cells appended so far.
    pub fn len(&self) -> usize {
        self.total
    }

    /// Returns `true` if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Consumes the encoder and returns the canonical run sequence.
    pub fn finish(self) -> Vec<BlockRun> {
        self.runs
    }
}

/// Encodes a flat block array into canonical runs.
pub fn rle_encode(blocks: &[BlockId]) -> Vec<BlockRun> {
    let mut encoder = RunEncoder::new();
    for &block in blocks {
        encoder.push(block);
    }
    encoder.finish()
}

/// Decodes runs back into a flat block array.
///
/// Returns an error if the total decoded length does not match `expected_len`.
pub fn rle_decode(runs: &[BlockRun], expected_len: usize) -> Result<Vec<BlockId>, RleError> {
    let actual: usize = runs.iter().map(|run| run.length as usize).sum();
    if actual != expected_len {
        return Err(RleError::LengthMismatch {
            expected: expected_len,
            actual,
        });
    }
    let mut result = Vec::with_capacity(expected_len);
    for run in runs {
        result.extend(std::iter::repeat_n(run.block, run.length as usize));
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
