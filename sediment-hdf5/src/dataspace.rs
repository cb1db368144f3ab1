// Maps read/write requests onto memory-space/file-space selections, and
// derives the natural-block tiling of a chunked dataset. Block requests
// clamp to the dataset edge on every axis; shape and rank problems fail
// here, before any transfer runs.

use sediment_base::{err, ErrorKind, Result};

use crate::arena::Arena;
use crate::binding::{Binding, Hid};
use crate::mdarray::element_count;

/// A planned transfer: the effective block shape, the two selections to
/// hand to the binding, and the element count of the transfer buffer.
pub(crate) struct Plan {
    pub dims: Vec<u64>,
    pub mem_space: Hid,
    pub file_space: Hid,
    pub buf_elems: usize,
}

/// Whole-dataset transfer: both selections cover everything.
pub(crate) fn plan_full(arena: &Arena, ds: Hid) -> Result<Plan> {
    let b = arena.binding();
    let file_space = arena.adopt(b.dataset_space(ds)?);
    let (dims, _) = b.space_dims(file_space)?;
    let mem_space = if dims.is_empty() {
        arena.adopt(b.create_scalar_space()?)
    } else {
        arena.adopt(b.create_simple_space(&dims, &dims)?)
    };
    let buf_elems = element_count(&dims)?;
    Ok(Plan {
        dims,
        mem_space,
        file_space,
        buf_elems,
    })
}

fn clamp(dims: &[u64], offset: &[u64], block: &[u64]) -> Result<(Vec<u64>, Vec<u64>)> {
    if offset.len() != dims.len() || block.len() != dims.len() {
        return Err(err(ErrorKind::RankMismatch {
            expected: dims.len(),
            actual: offset.len().max(block.len()),
        }));
    }
    let mut start = Vec::with_capacity(dims.len());
    let mut count = Vec::with_capacity(dims.len());
    for k in 0..dims.len() {
        let off = offset[k].min(dims[k]);
        start.push(off);
        count.push(block[k].min(dims[k] - off));
    }
    Ok((start, count))
}

/// Block transfer: a hyperslab on the file side, clamped to the dataset
/// edge, and a fresh memory extent of the effective shape.
pub(crate) fn plan_block(arena: &Arena, ds: Hid, offset: &[u64], block: &[u64]) -> Result<Plan> {
    let b = arena.binding();
    let file_space = arena.adopt(b.dataset_space(ds)?);
    let (dims, _) = b.space_dims(file_space)?;
    let (start, count) = clamp(&dims, offset, block)?;
    b.select_hyperslab(file_space, &start, &count)?;
    let mem_space = arena.adopt(b.create_simple_space(&count, &count)?);
    let buf_elems = element_count(&count)?;
    Ok(Plan {
        dims: count,
        mem_space,
        file_space,
        buf_elems,
    })
}

/// Block transfer into a caller-provided host array: the memory side is a
/// hyperslab at `mem_offset` inside `host_dims`. The transfer buffer spans
/// the whole host array.
pub(crate) fn plan_into_host(
    arena: &Arena,
    ds: Hid,
    host_dims: &[u64],
    mem_offset: &[u64],
    offset: &[u64],
    block: &[u64],
) -> Result<Plan> {
    let b = arena.binding();
    let file_space = arena.adopt(b.dataset_space(ds)?);
    let (dims, _) = b.space_dims(file_space)?;
    let (start, count) = clamp(&dims, offset, block)?;
    b.select_hyperslab(file_space, &start, &count)?;
    if host_dims.len() != count.len() || mem_offset.len() != count.len() {
        return Err(err(ErrorKind::RankMismatch {
            expected: count.len(),
            actual: host_dims.len().max(mem_offset.len()),
        }));
    }
    for k in 0..count.len() {
        if mem_offset[k] + count[k] > host_dims[k] {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "block [{}, {}) outside host axis of length {}",
                mem_offset[k],
                mem_offset[k] + count[k],
                host_dims[k]
            ))));
        }
    }
    let mem_space = arena.adopt(b.create_simple_space(host_dims, host_dims)?);
    b.select_hyperslab(mem_space, mem_offset, &count)?;
    let buf_elems = element_count(host_dims)?;
    Ok(Plan {
        dims: count,
        mem_space,
        file_space,
        buf_elems,
    })
}

/// One tile of the natural-block tiling.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NaturalBlock {
    pub index: Vec<u64>,
    pub offset: Vec<u64>,
    pub dims: Vec<u64>,
}

/// Lazy, restartable tiling of a dataset by its chunk shape (or by its
/// full shape when unchunked). The last block on each axis is truncated
/// at the dataset edge. Iteration is lexicographic over the block index,
/// rightmost axis fastest; a rank-0 dataset yields exactly one block.
#[derive(Clone, Debug)]
pub struct NaturalBlocks {
    dims: Vec<u64>,
    chunk: Vec<u64>,
    counts: Vec<u64>,
    total: u64,
    cursor: u64,
}

impl NaturalBlocks {
    pub fn new(dims: Vec<u64>, chunk: Option<Vec<u64>>) -> Self {
        let chunk: Vec<u64> = chunk
            .unwrap_or_else(|| dims.clone())
            .iter()
            .map(|c| (*c).max(1))
            .collect();
        let counts: Vec<u64> = dims
            .iter()
            .zip(&chunk)
            .map(|(d, c)| (d + c - 1) / c)
            .collect();
        let total = counts.iter().product();
        NaturalBlocks {
            dims,
            chunk,
            counts,
            total,
            cursor: 0,
        }
    }

    pub fn block_count(&self) -> u64 {
        self.total
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    // Pure position-to-tile mapping; the iterator is just a cursor over it.
    fn block_at(&self, at: u64) -> NaturalBlock {
        let rank = self.dims.len();
        let mut index = vec![0_u64; rank];
        let mut rem = at;
        for k in (0..rank).rev() {
            index[k] = rem % self.counts[k];
            rem /= self.counts[k];
        }
        let offset: Vec<u64> = index.iter().zip(&self.chunk).map(|(i, c)| i * c).collect();
        let dims: Vec<u64> = offset
            .iter()
            .zip(self.chunk.iter().zip(&self.dims))
            .map(|(o, (c, d))| (*c).min(d - o))
            .collect();
        NaturalBlock {
            index,
            offset,
            dims,
        }
    }
}

impl Iterator for NaturalBlocks {
    type Item = NaturalBlock;

    fn next(&mut self) -> Option<NaturalBlock> {
        if self.cursor >= self.total {
            return None;
        }
        let block = self.block_at(self.cursor);
        self.cursor += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.cursor) as usize;
        (left, Some(left))
    }
}
