//! Interleaving for burst error mitigation
//!
//! A shard-major N×M matrix (N shards of M bytes) is transposed into M
//! shards of N bytes, so a burst on the wire lands as one damaged byte in
//! many shards instead of several destroyed shards.

use crate::{FrameError, Result};

fn check_rectangular<S: AsRef<[u8]>>(matrix: &[S]) -> Result<usize> {
    let first = matrix.first().ok_or_else(|| FrameError::InterleavingError {
        msg: "Cannot interleave an empty matrix".to_string(),
    })?;
    let width = first.as_ref().len();
    if width == 0 {
        return Err(FrameError::InterleavingError {
            msg: "Matrix rows must be non-empty".to_string(),
        });
    }
    if let Some((row, r)) = matrix.iter().enumerate().find(|(_, r)| r.as_ref().len() != width) {
        return Err(FrameError::InterleavingError {
            msg: format!("Row {} has {} bytes, expected {}", row, r.as_ref().len(), width),
        });
    }
    Ok(width)
}

fn transpose<S: AsRef<[u8]>>(matrix: &[S]) -> Result<Vec<Vec<u8>>> {
    let width = check_rectangular(matrix)?;
    Ok((0..width)
        .map(|col| matrix.iter().map(|row| row.as_ref()[col]).collect())
        .collect())
}

/// Output row `i` holds byte `i` of every input row, in order.
pub fn interleave<S: AsRef<[u8]>>(matrix: &[S]) -> Result<Vec<Vec<u8>>> {
    transpose(matrix)
}

/// Exact inverse of [`interleave`].
pub fn deinterleave<S: AsRef<[u8]>>(matrix: &[S]) -> Result<Vec<Vec<u8>>> {
    transpose(matrix)
}

/// Generic interleaver over flat byte streams
pub trait Interleaver {
    /// Interleave data to spread errors
    fn interleave(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Deinterleave data to concentrate errors
    fn deinterleave(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Block interleaver implementation
///
/// Writes row by row and reads column by column. With `rows` shards of
/// `cols` bytes this is the flat form of [`interleave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInterleaver {
    rows: usize,
    cols: usize,
}

impl BlockInterleaver {
    /// Create a new block interleaver
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(FrameError::InterleavingError {
                msg: "Interleaver dimensions must be greater than 0".to_string(),
            });
        }

        Ok(Self { rows, cols })
    }

    /// Get the block size (total elements)
    pub fn block_size(&self) -> usize {
        self.rows * self.cols
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len % self.block_size() != 0 {
            return Err(FrameError::InterleavingError {
                msg: format!("Data length {} not multiple of block size {}", len, self.block_size()),
            });
        }
        Ok(())
    }

    fn permute(data: &[u8], rows: usize, cols: usize) -> Vec<u8> {
        let block_size = rows * cols;
        let mut result = Vec::with_capacity(data.len());
        for block in data.chunks_exact(block_size) {
            for col in 0..cols {
                for row in 0..rows {
                    result.push(block[row * cols + col]);
                }
            }
        }
        result
    }
}

impl Interleaver for BlockInterleaver {
    fn interleave(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.check_len(data.len())?;
        Ok(Self::permute(data, self.rows, self.cols))
    }

    fn deinterleave(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.check_len(data.len())?;
        // Reading the transposed block back column-wise undoes the permutation.
        Ok(Self::permute(data, self.cols, self.rows))
    }
}
