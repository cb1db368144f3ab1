// The typed marshaling layer: maps host element types to on-disk
// datatypes and converts payload bytes both ways. Reads widen through
// i64/f64 so a dataset can be read at any width of its class; integer
// narrowing truncates exactly as the native conversion path does, and
// crossing the integer/float divide is refused.

use sediment_base::{decode_vec, encode_vec, err, ErrorKind, Order, Result};

use crate::datatype::Datatype;

/// Payload widened to the common carrier of its class.
pub(crate) enum Decoded {
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

mod private {
    pub trait Sealed {}
}

/// Host element types the generic dataset surface accepts.
pub trait Element: Copy + Default + PartialEq + std::fmt::Debug + private::Sealed + 'static {
    /// The datatype the writer stores this element as.
    fn disk_type() -> Datatype;
    fn widen(vals: &[Self]) -> Decoded;
    fn narrow(vals: Decoded) -> Result<Vec<Self>>;
}

macro_rules! int_element {
    ($t:ty, $w:expr) => {
        impl private::Sealed for $t {}
        impl Element for $t {
            fn disk_type() -> Datatype {
                Datatype::Integer {
                    width: $w,
                    signed: true,
                    order: Order::Little,
                }
            }
            fn widen(vals: &[Self]) -> Decoded {
                Decoded::Ints(vals.iter().map(|v| *v as i64).collect())
            }
            fn narrow(vals: Decoded) -> Result<Vec<Self>> {
                match vals {
                    Decoded::Ints(v) => Ok(v.into_iter().map(|x| x as $t).collect()),
                    Decoded::Floats(_) => Err(err(ErrorKind::TypeMismatch(
                        "float data read as integers".into(),
                    ))),
                }
            }
        }
    };
}

macro_rules! float_element {
    ($t:ty, $w:expr) => {
        impl private::Sealed for $t {}
        impl Element for $t {
            fn disk_type() -> Datatype {
                Datatype::Float {
                    width: $w,
                    order: Order::Little,
                }
            }
            fn widen(vals: &[Self]) -> Decoded {
                Decoded::Floats(vals.iter().map(|v| *v as f64).collect())
            }
            fn narrow(vals: Decoded) -> Result<Vec<Self>> {
                match vals {
                    Decoded::Floats(v) => Ok(v.into_iter().map(|x| x as $t).collect()),
                    Decoded::Ints(_) => Err(err(ErrorKind::TypeMismatch(
                        "integer data read as floats".into(),
                    ))),
                }
            }
        }
    };
}

int_element!(i8, 1);
int_element!(i16, 2);
int_element!(i32, 4);
int_element!(i64, 8);
float_element!(f32, 4);
float_element!(f64, 8);

/// Decodes raw dataset bytes of a numeric-classed datatype. Enumerations
/// decode as their base ordinals, references as addresses, and array
/// types as their flattened elements.
pub(crate) fn decode_disk(ty: &Datatype, bytes: &[u8]) -> Result<Decoded> {
    match ty {
        Datatype::Integer {
            width,
            signed,
            order,
        } => {
            let v = match (*width, *signed) {
                (1, true) => decode_vec::<i8>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                (2, true) => decode_vec::<i16>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                (4, true) => decode_vec::<i32>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                (8, true) => decode_vec::<i64>(bytes, *order)?,
                (1, false) => decode_vec::<u8>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                (2, false) => decode_vec::<u16>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                (4, false) => decode_vec::<u32>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                (8, false) => decode_vec::<u64>(bytes, *order)?.into_iter().map(|x| x as i64).collect(),
                _ => {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "unsupported integer width {width}"
                    ))))
                }
            };
            Ok(Decoded::Ints(v))
        }
        Datatype::Float { width, order } => {
            let v = match *width {
                4 => decode_vec::<f32>(bytes, *order)?.into_iter().map(|x| x as f64).collect(),
                8 => decode_vec::<f64>(bytes, *order)?,
                _ => {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "unsupported float width {width}"
                    ))))
                }
            };
            Ok(Decoded::Floats(v))
        }
        Datatype::Enumeration { base, .. } => decode_disk(base, bytes),
        Datatype::Reference => Ok(Decoded::Ints(decode_vec::<i64>(bytes, Order::Little)?)),
        Datatype::Array { elem, .. } => decode_disk(elem, bytes),
        other => Err(err(ErrorKind::TypeMismatch(format!(
            "datatype class {:?} holds no plain numeric data",
            other.class()
        )))),
    }
}

/// Encodes widened payload into the byte layout of a numeric-classed
/// datatype. Integer narrowing truncates.
pub(crate) fn encode_for_disk(ty: &Datatype, vals: &Decoded) -> Result<Vec<u8>> {
    match (ty, vals) {
        (
            Datatype::Integer {
                width,
                signed,
                order,
            },
            Decoded::Ints(v),
        ) => match (*width, *signed) {
            (1, true) => Ok(encode_vec(&v.iter().map(|x| *x as i8).collect::<Vec<_>>(), *order)),
            (2, true) => Ok(encode_vec(&v.iter().map(|x| *x as i16).collect::<Vec<_>>(), *order)),
            (4, true) => Ok(encode_vec(&v.iter().map(|x| *x as i32).collect::<Vec<_>>(), *order)),
            (8, true) => Ok(encode_vec(v, *order)),
            (1, false) => Ok(encode_vec(&v.iter().map(|x| *x as u8).collect::<Vec<_>>(), *order)),
            (2, false) => Ok(encode_vec(&v.iter().map(|x| *x as u16).collect::<Vec<_>>(), *order)),
            (4, false) => Ok(encode_vec(&v.iter().map(|x| *x as u32).collect::<Vec<_>>(), *order)),
            (8, false) => Ok(encode_vec(&v.iter().map(|x| *x as u64).collect::<Vec<_>>(), *order)),
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "unsupported integer width {width}"
            )))),
        },
        (Datatype::Float { width, order }, Decoded::Floats(v)) => match *width {
            4 => Ok(encode_vec(&v.iter().map(|x| *x as f32).collect::<Vec<_>>(), *order)),
            8 => Ok(encode_vec(v, *order)),
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "unsupported float width {width}"
            )))),
        },
        (Datatype::Enumeration { base, .. }, _) => encode_for_disk(base, vals),
        (Datatype::Reference, Decoded::Ints(v)) => Ok(encode_vec(v, Order::Little)),
        (Datatype::Array { elem, .. }, _) => encode_for_disk(elem, vals),
        (Datatype::Integer { .. }, Decoded::Floats(_)) => Err(err(ErrorKind::TypeMismatch(
            "float values written to an integer dataset".into(),
        ))),
        (Datatype::Float { .. }, Decoded::Ints(_)) => Err(err(ErrorKind::TypeMismatch(
            "integer values written to a float dataset".into(),
        ))),
        (other, _) => Err(err(ErrorKind::TypeMismatch(format!(
            "datatype class {:?} holds no plain numeric data",
            other.class()
        )))),
    }
}

/// NUL-pads (or truncates) a string into a fixed-length slot.
pub(crate) fn pack_fixed_str(s: &str, len: usize) -> Vec<u8> {
    let mut out = vec![0_u8; len];
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Reads a fixed-length slot up to its first NUL.
pub(crate) fn unpack_fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
