//! Row-major chunk grid arithmetic

use crate::error::Result;
use bitinfo_core::chunk_grid;

/// Chunk grid of one variable
#[derive(Debug, Clone)]
pub(crate) struct ChunkLayout {
    shape: Vec<usize>,
    chunks: Vec<usize>,
    grid: Vec<usize>,
    strides: Vec<usize>,
    count: usize,
}

impl ChunkLayout {
    pub(crate) fn new(shape: &[usize], chunks: &[usize]) -> Result<Self> {
        let mut grid = vec![0; shape.len()];
        let count = chunk_grid(shape, chunks, &mut grid)?;
        let mut strides = vec![1; shape.len()];
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        Ok(Self {
            shape: shape.to_vec(),
            chunks: chunks.to_vec(),
            grid,
            strides,
            count,
        })
    }

    /// Number of chunks
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Start and extent along each axis of chunk `index`
    fn bounds(&self, index: usize) -> (Vec<usize>, Vec<usize>) {
        let ndim = self.shape.len();
        let mut start = vec![0; ndim];
        let mut extent = vec![0; ndim];
        let mut rest = index;
        for axis in (0..ndim).rev() {
            let coord = rest % self.grid[axis];
            rest /= self.grid[axis];
            start[axis] = coord * self.chunks[axis];
            extent[axis] = self.chunks[axis].min(self.shape[axis] - start[axis]);
        }
        (start, extent)
    }

    /// Number of elements in chunk `index`
    pub(crate) fn chunk_len(&self, index: usize) -> usize {
        self.bounds(index).1.iter().product()
    }

    /// Visit the contiguous runs of chunk `index`
    ///
    /// `f(array_offset, chunk_offset, len)` receives element offsets into the
    /// full array and into the chunk, in chunk row-major order.
    fn for_each_run(&self, index: usize, mut f: impl FnMut(usize, usize, usize)) {
        let ndim = self.shape.len();
        if ndim == 0 {
            f(0, 0, 1);
            return;
        }
        let (start, extent) = self.bounds(index);
        let run = extent[ndim - 1];
        let outer: usize = extent[..ndim - 1].iter().product();
        let mut pos = vec![0; ndim - 1];
        for row in 0..outer {
            let offset: usize = (0..ndim)
                .map(|a| {
                    let local = if a < ndim - 1 { pos[a] } else { 0 };
                    (start[a] + local) * self.strides[a]
                })
                .sum();
            f(offset, row * run, run);
            // odometer over the leading axes
            for a in (0..ndim - 1).rev() {
                pos[a] += 1;
                if pos[a] < extent[a] {
                    break;
                }
                pos[a] = 0;
            }
        }
    }

    /// Copy chunk `index` out of a row-major byte array
    pub(crate) fn gather(&self, src: &[u8], index: usize, elem: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.chunk_len(index) * elem);
        self.for_each_run(index, |offset, _, len| {
            out.extend_from_slice(&src[offset * elem..(offset + len) * elem]);
        });
        out
    }

    /// Copy a decoded chunk into its place in a row-major byte array
    pub(crate) fn scatter(&self, dst: &mut [u8], chunk: &[u8], index: usize, elem: usize) {
        self.for_each_run(index, |offset, local, len| {
            dst[offset * elem..(offset + len) * elem]
                .copy_from_slice(&chunk[local * elem..(local + len) * elem]);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_scatter_partial_chunks() {
        // 3 x 5 array of u8 values 0..15, chunks of 2 x 2
        let src: Vec<u8> = (0..15).collect();
        let layout = ChunkLayout::new(&[3, 5], &[2, 2]).unwrap();
        assert_eq!(layout.count(), 6);
        assert_eq!(layout.gather(&src, 0, 1), vec![0, 1, 5, 6]);
        assert_eq!(layout.gather(&src, 2, 1), vec![4, 9]);
        assert_eq!(layout.gather(&src, 5, 1), vec![14]);

        let mut dst = vec![0u8; 15];
        for i in 0..layout.count() {
            let chunk = layout.gather(&src, i, 1);
            assert_eq!(chunk.len(), layout.chunk_len(i));
            layout.scatter(&mut dst, &chunk, i, 1);
        }
        assert_eq!(dst, src);
    }

    #[test]
    fn test_scalar_and_empty() {
        let scalar = ChunkLayout::new(&[], &[]).unwrap();
        assert_eq!(scalar.count(), 1);
        assert_eq!(scalar.gather(&[7, 8, 9, 10], 0, 4), vec![7, 8, 9, 10]);

        let empty = ChunkLayout::new(&[0, 3], &[1, 3]).unwrap();
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn test_three_dimensional_elements() {
        let shape = [2, 3, 4];
        let src: Vec<u8> = (0..24u16).flat_map(|v| v.to_le_bytes()).collect();
        let layout = ChunkLayout::new(&shape, &[1, 2, 3]).unwrap();
        assert_eq!(layout.count(), 2 * 2 * 2);
        let mut dst = vec![0u8; src.len()];
        for i in 0..layout.count() {
            let chunk = layout.gather(&src, i, 2);
            layout.scatter(&mut dst, &chunk, i, 2);
        }
        assert_eq!(dst, src);
    }
}
