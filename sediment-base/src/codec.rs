// Lossless conversion between primitive slices and raw byte buffers in a
// chosen byte order. All functions are generic over funty::Numeric so there
// is exactly one implementation for {i8,i16,i32,i64,u8..u64,f32,f64}; the
// offset-parameterized forms write into caller storage and do not allocate.

use funty::Numeric;

use crate::error::{err, ErrorKind, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Order {
    Little,
    Big,
}

impl Order {
    pub const fn native() -> Order {
        if cfg!(target_endian = "big") {
            Order::Big
        } else {
            Order::Little
        }
    }
}

/// Write one value at byte offset `at`. Panics if the buffer is too short.
pub fn put_at<T>(buf: &mut [u8], at: usize, val: T, order: Order)
where
    T: Numeric,
    T::Bytes: AsRef<[u8]>,
{
    let bytes = match order {
        Order::Little => val.to_le_bytes(),
        Order::Big => val.to_be_bytes(),
    };
    let n = std::mem::size_of::<T>();
    buf[at..at + n].copy_from_slice(bytes.as_ref());
}

/// Read one value at byte offset `at`. Panics if the buffer is too short.
pub fn take_at<T>(buf: &[u8], at: usize, order: Order) -> T
where
    T: Numeric,
    T::Bytes: AsRef<[u8]> + AsMut<[u8]> + Default,
{
    let mut bytes = T::Bytes::default();
    let n = std::mem::size_of::<T>();
    bytes.as_mut().copy_from_slice(&buf[at..at + n]);
    match order {
        Order::Little => T::from_le_bytes(bytes),
        Order::Big => T::from_be_bytes(bytes),
    }
}

pub fn encode_into<T>(vals: &[T], out: &mut [u8], order: Order) -> Result<()>
where
    T: Numeric,
    T::Bytes: AsRef<[u8]>,
{
    let n = std::mem::size_of::<T>();
    if out.len() != vals.len() * n {
        return Err(err(ErrorKind::ShapeMismatch(format!(
            "encode of {} values into {} bytes",
            vals.len(),
            out.len()
        ))));
    }
    for (i, v) in vals.iter().enumerate() {
        put_at(out, i * n, *v, order);
    }
    Ok(())
}

pub fn encode_vec<T>(vals: &[T], order: Order) -> Vec<u8>
where
    T: Numeric,
    T::Bytes: AsRef<[u8]>,
{
    let n = std::mem::size_of::<T>();
    let mut out = vec![0_u8; vals.len() * n];
    for (i, v) in vals.iter().enumerate() {
        put_at(&mut out, i * n, *v, order);
    }
    out
}

pub fn decode_into<T>(bytes: &[u8], out: &mut [T], order: Order) -> Result<()>
where
    T: Numeric,
    T::Bytes: AsRef<[u8]> + AsMut<[u8]> + Default,
{
    let n = std::mem::size_of::<T>();
    if bytes.len() != out.len() * n {
        return Err(err(ErrorKind::ShapeMismatch(format!(
            "decode of {} bytes into {} values",
            bytes.len(),
            out.len()
        ))));
    }
    for (i, v) in out.iter_mut().enumerate() {
        *v = take_at(bytes, i * n, order);
    }
    Ok(())
}

pub fn decode_vec<T>(bytes: &[u8], order: Order) -> Result<Vec<T>>
where
    T: Numeric,
    T::Bytes: AsRef<[u8]> + AsMut<[u8]> + Default,
{
    let n = std::mem::size_of::<T>();
    if bytes.len() % n != 0 {
        return Err(err(ErrorKind::ShapeMismatch(format!(
            "{} bytes is not a whole number of {}-byte values",
            bytes.len(),
            n
        ))));
    }
    let mut out = vec![T::default(); bytes.len() / n];
    decode_into(bytes, &mut out, order)?;
    Ok(out)
}
