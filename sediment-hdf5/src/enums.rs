// Enumeration value containers. Ordinals live in the smallest signed
// storage that holds cardinality - 1, with the same strict boundary the
// datatype layer uses for storage selection, so a container and its
// committed type always agree on width.

use sediment_base::{err, ErrorKind, Result};

use crate::datatype::{ordinal_fits_width, ordinal_width_for, Datatype};
use crate::mdarray::element_count;

/// A named enumeration: an ordered list of value names.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumType {
    name: String,
    values: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Result<EnumType> {
        if values.is_empty() {
            return Err(err(ErrorKind::EnumIncompatible(
                "enumeration with no values".into(),
            )));
        }
        Ok(EnumType {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }

    pub(crate) fn from_datatype(name: impl Into<String>, ty: &Datatype) -> Result<EnumType> {
        match ty {
            Datatype::Enumeration { names, .. } => Ok(EnumType {
                name: name.into(),
                values: names.clone(),
            }),
            _ => Err(err(ErrorKind::TypeMismatch(
                "dataset does not hold an enumeration".into(),
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    pub fn storage_width(&self) -> u8 {
        ordinal_width_for(self.values.len())
    }

    pub fn datatype(&self) -> Result<Datatype> {
        Datatype::enumeration(self.values.clone())
    }

    pub fn ordinal_of(&self, value: &str) -> Result<i32> {
        self.values
            .iter()
            .position(|v| v == value)
            .map(|p| p as i32)
            .ok_or_else(|| err(ErrorKind::UnknownEnumValue(value.to_string())))
    }

    pub fn value_of(&self, ordinal: i64) -> Result<&str> {
        if ordinal < 0 || ordinal as usize >= self.values.len() {
            return Err(err(ErrorKind::OrdinalOutOfRange {
                ordinal,
                cardinality: self.values.len(),
            }));
        }
        Ok(&self.values[ordinal as usize])
    }
}

/// A scalar enumeration value, validated against its type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumValue {
    ty: EnumType,
    ordinal: i32,
}

impl EnumValue {
    pub fn new(ty: EnumType, ordinal: i64) -> Result<EnumValue> {
        ty.value_of(ordinal)?;
        Ok(EnumValue {
            ty,
            ordinal: ordinal as i32,
        })
    }

    pub fn from_name(ty: EnumType, value: &str) -> Result<EnumValue> {
        let ordinal = ty.ordinal_of(value)?;
        Ok(EnumValue { ty, ordinal })
    }

    pub fn ty(&self) -> &EnumType {
        &self.ty
    }

    pub fn ordinal(&self) -> i32 {
        self.ordinal
    }

    pub fn as_str(&self) -> &str {
        &self.ty.values[self.ordinal as usize]
    }
}

/// Ordinal storage at one of the three signed widths.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum OrdinalStore {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl OrdinalStore {
    fn width(&self) -> u8 {
        match self {
            OrdinalStore::I8(_) => 1,
            OrdinalStore::I16(_) => 2,
            OrdinalStore::I32(_) => 4,
        }
    }

    fn widened(&self) -> Vec<i64> {
        match self {
            OrdinalStore::I8(v) => v.iter().map(|x| *x as i64).collect(),
            OrdinalStore::I16(v) => v.iter().map(|x| *x as i64).collect(),
            OrdinalStore::I32(v) => v.iter().map(|x| *x as i64).collect(),
        }
    }

    fn pack(ordinals: &[i64], width: u8) -> Result<OrdinalStore> {
        for o in ordinals {
            if !ordinal_fits_width(*o, width) {
                return Err(err(ErrorKind::NarrowingOverflow(*o)));
            }
        }
        Ok(match width {
            1 => OrdinalStore::I8(ordinals.iter().map(|o| *o as i8).collect()),
            2 => OrdinalStore::I16(ordinals.iter().map(|o| *o as i16).collect()),
            _ => OrdinalStore::I32(ordinals.iter().map(|o| *o as i32).collect()),
        })
    }
}

/// An N-dimensional array of enumeration ordinals.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumArray {
    ty: EnumType,
    dims: Vec<u64>,
    store: OrdinalStore,
}

impl EnumArray {
    pub fn from_ordinals(ty: EnumType, dims: Vec<u64>, ordinals: &[i64]) -> Result<EnumArray> {
        let n = element_count(&dims)?;
        if ordinals.len() != n {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "{} ordinals for shape {:?}",
                ordinals.len(),
                dims
            ))));
        }
        for o in ordinals {
            ty.value_of(*o)?;
        }
        let store = OrdinalStore::pack(ordinals, ty.storage_width())?;
        Ok(EnumArray { ty, dims, store })
    }

    pub fn from_names(ty: EnumType, dims: Vec<u64>, values: &[&str]) -> Result<EnumArray> {
        let ordinals: Vec<i64> = values
            .iter()
            .map(|v| ty.ordinal_of(v).map(|o| o as i64))
            .collect::<Result<_>>()?;
        EnumArray::from_ordinals(ty, dims, &ordinals)
    }

    pub fn ty(&self) -> &EnumType {
        &self.ty
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        match &self.store {
            OrdinalStore::I8(v) => v.len(),
            OrdinalStore::I16(v) => v.len(),
            OrdinalStore::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage_width(&self) -> u8 {
        self.store.width()
    }

    pub fn ordinals(&self) -> Vec<i64> {
        self.store.widened()
    }

    pub fn names(&self) -> Vec<&str> {
        self.store
            .widened()
            .into_iter()
            .map(|o| &*self.ty.values[o as usize])
            .collect()
    }

    /// Re-stores at another width. Widening is lossless; narrowing fails
    /// on any ordinal past the target's strict boundary.
    pub fn with_storage_width(self, width: u8) -> Result<EnumArray> {
        let ordinals = self.store.widened();
        let store = OrdinalStore::pack(&ordinals, width)?;
        Ok(EnumArray {
            ty: self.ty,
            dims: self.dims,
            store,
        })
    }
}
