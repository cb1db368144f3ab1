use sediment_base::{err, ErrorKind, Order, Result};

/// Sentinel for an extendable axis in a max-dimensions vector.
pub const UNLIMITED: u64 = u64::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CharSet {
    Ascii,
    Utf8,
}

/// The on-disk class of a datatype, without its parameters.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TypeClass {
    Integer,
    Float,
    String,
    BitField,
    Opaque,
    Enum,
    Array,
    Compound,
    Reference,
}

/// One member of a compound datatype. Members occupy
/// `[offset, offset + ty.size())` and never overlap.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CompoundField {
    pub name: String,
    pub offset: usize,
    pub ty: Datatype,
}

/// An HDF5 datatype. Every variant knows its byte size.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Datatype {
    Integer { width: u8, signed: bool, order: Order },
    Float { width: u8, order: Order },
    /// `len` includes the terminating NUL.
    FixedString { len: usize, charset: CharSet },
    VariableString { charset: CharSet },
    Enumeration { base: Box<Datatype>, names: Vec<String> },
    /// `words` 64-bit words per element.
    BitField { words: usize },
    Opaque { tag: String, len: usize },
    Array { elem: Box<Datatype>, dims: Vec<u64> },
    Compound { members: Vec<CompoundField>, size: usize },
    Reference,
}

impl Datatype {
    pub fn le_int(width: u8, signed: bool) -> Datatype {
        Datatype::Integer {
            width,
            signed,
            order: Order::Little,
        }
    }

    pub fn le_float(width: u8) -> Datatype {
        Datatype::Float {
            width,
            order: Order::Little,
        }
    }

    pub fn fixed_string(len: usize) -> Datatype {
        Datatype::FixedString {
            len,
            charset: CharSet::Utf8,
        }
    }

    pub fn var_string() -> Datatype {
        Datatype::VariableString {
            charset: CharSet::Utf8,
        }
    }

    /// An enumeration over the smallest signed base integer that holds
    /// `names.len() - 1`.
    pub fn enumeration(names: Vec<String>) -> Result<Datatype> {
        if names.is_empty() {
            return Err(err(ErrorKind::EnumIncompatible(
                "enumeration with no values".into(),
            )));
        }
        let base = Datatype::le_int(ordinal_width_for(names.len()), true);
        Ok(Datatype::Enumeration {
            base: Box::new(base),
            names,
        })
    }

    /// Array types always wrap a scalar element kind.
    pub fn array(elem: Datatype, dims: Vec<u64>) -> Result<Datatype> {
        if matches!(elem, Datatype::Array { .. }) {
            return Err(err(ErrorKind::TypeMismatch(
                "array datatype cannot wrap another array".into(),
            )));
        }
        Ok(Datatype::Array {
            elem: Box::new(elem),
            dims,
        })
    }

    /// A packed compound: each offset is the sum of the preceding sizes.
    pub fn compound(fields: Vec<(String, Datatype)>) -> Datatype {
        let mut members = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for (name, ty) in fields {
            let size = ty.size();
            members.push(CompoundField { name, offset, ty });
            offset += size;
        }
        Datatype::Compound {
            members,
            size: offset,
        }
    }

    /// A compound with caller-supplied offsets and total size, checked
    /// against the member invariants.
    pub fn compound_raw(members: Vec<CompoundField>, size: usize) -> Result<Datatype> {
        let mut end = 0;
        let mut prev = None;
        for m in &members {
            if let Some(p) = prev {
                if m.offset <= p {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "compound member {} does not advance past offset {}",
                        m.name, p
                    ))));
                }
            }
            if m.offset < end {
                return Err(err(ErrorKind::TypeMismatch(format!(
                    "compound member {} overlaps its predecessor",
                    m.name
                ))));
            }
            end = m.offset + m.ty.size();
            prev = Some(m.offset);
        }
        if size < end {
            return Err(err(ErrorKind::TypeMismatch(format!(
                "compound size {} smaller than members' extent {}",
                size, end
            ))));
        }
        Ok(Datatype::Compound { members, size })
    }

    pub fn size(&self) -> usize {
        match self {
            Datatype::Integer { width, .. } => *width as usize,
            Datatype::Float { width, .. } => *width as usize,
            Datatype::FixedString { len, .. } => *len,
            // Variable-length data never rides the flat byte path.
            Datatype::VariableString { .. } => 0,
            Datatype::Enumeration { base, .. } => base.size(),
            Datatype::BitField { words } => words * 8,
            Datatype::Opaque { len, .. } => *len,
            Datatype::Array { elem, dims } => {
                let n: u64 = dims.iter().product();
                elem.size() * n as usize
            }
            Datatype::Compound { size, .. } => *size,
            Datatype::Reference => 8,
        }
    }

    pub fn class(&self) -> TypeClass {
        match self {
            Datatype::Integer { .. } => TypeClass::Integer,
            Datatype::Float { .. } => TypeClass::Float,
            Datatype::FixedString { .. } | Datatype::VariableString { .. } => TypeClass::String,
            Datatype::Enumeration { .. } => TypeClass::Enum,
            Datatype::BitField { .. } => TypeClass::BitField,
            Datatype::Opaque { .. } => TypeClass::Opaque,
            Datatype::Array { .. } => TypeClass::Array,
            Datatype::Compound { .. } => TypeClass::Compound,
            Datatype::Reference => TypeClass::Reference,
        }
    }
}

/// Byte width of the smallest signed integer that holds `cardinality - 1`
/// ordinals. The comparison is strict at the i8/i16 maxima: 127 values
/// still fit a byte, 128 do not. The same boundary governs narrowing
/// validation in the enumeration containers.
pub fn ordinal_width_for(cardinality: usize) -> u8 {
    let max_ordinal = cardinality.saturating_sub(1);
    if max_ordinal < i8::MAX as usize {
        1
    } else if max_ordinal < i16::MAX as usize {
        2
    } else {
        4
    }
}

/// True when a stored ordinal fits a storage width under the same strict
/// boundary as [`ordinal_width_for`].
pub fn ordinal_fits_width(ordinal: i64, width: u8) -> bool {
    match width {
        1 => (0..(i8::MAX as i64)).contains(&ordinal),
        2 => (0..(i16::MAX as i64)).contains(&ordinal),
        _ => (0..(i32::MAX as i64)).contains(&ordinal),
    }
}
