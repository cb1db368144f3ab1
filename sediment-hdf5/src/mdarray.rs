use sediment_base::{err, ErrorKind, Result};

/// Flat element count of a shape, with overflow checked.
pub(crate) fn element_count(dims: &[u64]) -> Result<usize> {
    let mut n: usize = 1;
    for d in dims {
        let d = usize::try_from(*d)
            .map_err(|_| err(ErrorKind::ShapeMismatch(format!("axis length {d} too large"))))?;
        n = n
            .checked_mul(d)
            .ok_or_else(|| err(ErrorKind::ShapeMismatch("shape overflows".into())))?;
    }
    Ok(n)
}

/// A dense N-dimensional array in row-major order. Rank 0 is a scalar
/// holding one element; any axis may be 0, making the array empty.
#[derive(Clone, PartialEq, Debug)]
pub struct MdArray<T> {
    dims: Vec<u64>,
    data: Vec<T>,
}

impl<T: Clone> MdArray<T> {
    pub fn new(dims: Vec<u64>, data: Vec<T>) -> Result<Self> {
        let n = element_count(&dims)?;
        if data.len() != n {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "{} elements for shape {:?} (needs {})",
                data.len(),
                dims,
                n
            ))));
        }
        Ok(MdArray { dims, data })
    }

    pub fn filled(dims: Vec<u64>, val: T) -> Result<Self> {
        let n = element_count(&dims)?;
        Ok(MdArray {
            dims,
            data: vec![val; n],
        })
    }

    pub fn scalar(val: T) -> Self {
        MdArray {
            dims: Vec::new(),
            data: vec![val],
        }
    }

    /// A rank-2 array from equal-length rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * width);
        for r in rows {
            if r.len() != width {
                return Err(err(ErrorKind::ShapeMismatch(
                    "matrix rows differ in length".into(),
                )));
            }
            data.extend_from_slice(r);
        }
        MdArray::new(vec![rows.len() as u64, width as u64], data)
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Row-major flat position of a multi-index:
    /// `i0*d1*...*d{n-1} + i1*d2*...*d{n-1} + ... + i{n-1}`.
    pub fn flat_index(&self, index: &[u64]) -> Result<usize> {
        if index.len() != self.dims.len() {
            return Err(err(ErrorKind::RankMismatch {
                expected: self.dims.len(),
                actual: index.len(),
            }));
        }
        let mut flat = 0_usize;
        for (i, d) in index.iter().zip(&self.dims) {
            if i >= d {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "index {i} outside axis of length {d}"
                ))));
            }
            flat = flat * *d as usize + *i as usize;
        }
        Ok(flat)
    }

    pub fn get(&self, index: &[u64]) -> Result<&T> {
        let flat = self.flat_index(index)?;
        Ok(&self.data[flat])
    }

    pub fn set(&mut self, index: &[u64], val: T) -> Result<()> {
        let flat = self.flat_index(index)?;
        self.data[flat] = val;
        Ok(())
    }

    /// Rank-1 view of the data.
    pub fn as_vec(&self) -> Result<&[T]> {
        if self.rank() != 1 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 1,
                actual: self.rank(),
            }));
        }
        Ok(&self.data)
    }

    /// Rank-2 rows.
    pub fn to_matrix(&self) -> Result<Vec<Vec<T>>> {
        if self.rank() != 2 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 2,
                actual: self.rank(),
            }));
        }
        let width = self.dims[1] as usize;
        if width == 0 {
            return Ok(vec![Vec::new(); self.dims[0] as usize]);
        }
        Ok(self.data.chunks(width).map(|r| r.to_vec()).collect())
    }
}
