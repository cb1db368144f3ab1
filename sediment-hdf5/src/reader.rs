// The typed read surface. Every operation plans its dataspaces under an
// arena, pulls raw bytes through the binding, and converts them with the
// marshaling layer. Datasets stored as an HDF5 array type over a scalar
// dataspace read back as ordinary N-dimensional data; the two on-disk
// representations are unified here.

use std::collections::HashMap;
use std::marker::PhantomData;

use sediment_base::{take_at, BitField, err, ErrorKind, Order, Result};

use crate::arena::{with_arena, Arena};
use crate::binding::{Binding, Hid};
use crate::compound::{AccessMode, FieldSource, Record};
use crate::dataspace::{plan_block, plan_full, plan_into_host, NaturalBlock, NaturalBlocks};
use crate::datatype::Datatype;
use crate::elem::{decode_disk, encode_for_disk, unpack_fixed_str, Element};
use crate::enums::{EnumArray, EnumType, EnumValue};
use crate::file::{norm, H5File};
use crate::mdarray::MdArray;
use crate::members::FactoryRegistry;
use crate::registry::{member_variant_attr, Registry, TypeVariant, TYPE_VARIANT_ATTR};

/// Read view of an open file.
#[derive(Clone, Copy)]
pub struct Reader<'f> {
    f: &'f H5File,
}

impl<'f> Reader<'f> {
    pub(crate) fn new(f: &'f H5File) -> Reader<'f> {
        Reader { f }
    }

    fn b(&self) -> &dyn Binding {
        self.f.binding()
    }

    fn open_ds(&self, arena: &Arena, path: &str) -> Result<Hid> {
        let b = arena.binding();
        if !b.exists(self.f.fh(), path)? {
            return Err(err(ErrorKind::NoSuchObject(path.to_string())));
        }
        Ok(arena.adopt(b.open_dataset(self.f.fh(), path)?))
    }

    // Generic numeric reads.

    pub fn read_md_array<T: Element>(&self, path: &str) -> Result<MdArray<T>> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let plan = plan_full(a, ds)?;
            // An array type over a scalar space is the other spelling of
            // multi-dimensional data; surface it with its array shape.
            let dims = match &ty {
                Datatype::Array { dims, .. } if plan.dims.is_empty() => dims.clone(),
                _ => plan.dims.clone(),
            };
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let vals = T::narrow(decode_disk(&ty, &buf)?)?;
            MdArray::new(dims, vals)
        })
    }

    pub fn read_scalar<T: Element>(&self, path: &str) -> Result<T> {
        let arr = self.read_md_array::<T>(path)?;
        if arr.rank() != 0 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 0,
                actual: arr.rank(),
            }));
        }
        Ok(arr.data()[0])
    }

    pub fn read_array<T: Element>(&self, path: &str) -> Result<Vec<T>> {
        let arr = self.read_md_array::<T>(path)?;
        if arr.rank() != 1 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 1,
                actual: arr.rank(),
            }));
        }
        Ok(arr.into_data())
    }

    pub fn read_matrix<T: Element>(&self, path: &str) -> Result<MdArray<T>> {
        let arr = self.read_md_array::<T>(path)?;
        if arr.rank() != 2 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 2,
                actual: arr.rank(),
            }));
        }
        Ok(arr)
    }

    fn read_block_raw<T: Element>(
        &self,
        path: &str,
        offset: &[u64],
        block: &[u64],
    ) -> Result<MdArray<T>> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            if matches!(ty, Datatype::Array { .. }) {
                return Err(err(ErrorKind::TypeMismatch(
                    "array-typed datasets cannot be read by block".into(),
                )));
            }
            let plan = plan_block(a, ds, offset, block)?;
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let vals = T::narrow(decode_disk(&ty, &buf)?)?;
            MdArray::new(plan.dims, vals)
        })
    }

    pub fn read_md_block_with_offset<T: Element>(
        &self,
        path: &str,
        block_dims: &[u64],
        offset: &[u64],
    ) -> Result<MdArray<T>> {
        self.read_block_raw(path, offset, block_dims)
    }

    pub fn read_md_block<T: Element>(
        &self,
        path: &str,
        block_dims: &[u64],
        block_index: &[u64],
    ) -> Result<MdArray<T>> {
        if block_dims.len() != block_index.len() {
            return Err(err(ErrorKind::RankMismatch {
                expected: block_dims.len(),
                actual: block_index.len(),
            }));
        }
        let offset: Vec<u64> = block_dims
            .iter()
            .zip(block_index)
            .map(|(d, i)| d * i)
            .collect();
        self.read_block_raw(path, &offset, block_dims)
    }

    pub fn read_array_block_with_offset<T: Element>(
        &self,
        path: &str,
        block_size: u64,
        offset: u64,
    ) -> Result<Vec<T>> {
        Ok(self
            .read_block_raw::<T>(path, &[offset], &[block_size])?
            .into_data())
    }

    pub fn read_array_block<T: Element>(
        &self,
        path: &str,
        block_size: u64,
        block_index: u64,
    ) -> Result<Vec<T>> {
        self.read_array_block_with_offset(path, block_size, block_size * block_index)
    }

    pub fn read_matrix_block_with_offset<T: Element>(
        &self,
        path: &str,
        block_dims: (u64, u64),
        offset: (u64, u64),
    ) -> Result<MdArray<T>> {
        self.read_block_raw(path, &[offset.0, offset.1], &[block_dims.0, block_dims.1])
    }

    pub fn read_matrix_block<T: Element>(
        &self,
        path: &str,
        block_dims: (u64, u64),
        block_index: (u64, u64),
    ) -> Result<MdArray<T>> {
        self.read_matrix_block_with_offset(
            path,
            block_dims,
            (block_dims.0 * block_index.0, block_dims.1 * block_index.1),
        )
    }

    /// Reads a block into a hyperslab of `host`, leaving the rest of the
    /// host array untouched.
    pub fn read_into_md_array<T: Element>(
        &self,
        path: &str,
        host: &mut MdArray<T>,
        mem_offset: &[u64],
        offset: &[u64],
        block_dims: &[u64],
    ) -> Result<()> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let plan = plan_into_host(a, ds, host.dims(), mem_offset, offset, block_dims)?;
            // The transfer buffer spans the whole host array so the
            // unselected elements survive the round through disk form.
            let mut buf = encode_for_disk(&ty, &T::widen(host.data()))?;
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let vals = T::narrow(decode_disk(&ty, &buf)?)?;
            host.data_mut().copy_from_slice(&vals);
            Ok(())
        })
    }

    /// The chunk-aligned tiling of a dataset.
    pub fn natural_blocks(&self, path: &str) -> Result<NaturalBlocks> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let space = a.adopt(a.binding().dataset_space(ds)?);
            let (dims, _) = a.binding().space_dims(space)?;
            let (_, chunk) = a.binding().dataset_layout(ds)?;
            Ok(NaturalBlocks::new(dims, chunk))
        })
    }

    /// Streams a dataset one natural block per round-trip.
    pub fn read_natural_blocks<T: Element>(
        &self,
        path: &str,
    ) -> Result<NaturalBlockReader<'f, T>> {
        let blocks = self.natural_blocks(path)?;
        Ok(NaturalBlockReader {
            reader: *self,
            path: norm(path)?,
            blocks,
            _elem: PhantomData,
        })
    }

    // Strings.

    fn read_strings_full(&self, path: &str) -> Result<(Vec<u64>, Vec<String>)> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let plan = plan_full(a, ds)?;
            match &ty {
                Datatype::FixedString { len, .. } => {
                    let mut buf = vec![0_u8; len * plan.buf_elems];
                    a.binding()
                        .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
                    let vals = if *len == 0 {
                        vec![String::new(); plan.buf_elems]
                    } else {
                        buf.chunks(*len).map(unpack_fixed_str).collect()
                    };
                    Ok((plan.dims, vals))
                }
                Datatype::VariableString { .. } => {
                    let vals =
                        a.binding()
                            .read_strings(ds, plan.mem_space, plan.file_space)?;
                    Ok((plan.dims, vals))
                }
                _ => Err(err(ErrorKind::TypeMismatch(format!(
                    "{path} does not hold strings"
                )))),
            }
        })
    }

    pub fn read_string(&self, path: &str) -> Result<String> {
        let (dims, mut vals) = self.read_strings_full(path)?;
        if !dims.is_empty() || vals.len() != 1 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 0,
                actual: dims.len(),
            }));
        }
        Ok(vals.remove(0))
    }

    pub fn read_string_array(&self, path: &str) -> Result<Vec<String>> {
        let (dims, vals) = self.read_strings_full(path)?;
        if dims.len() != 1 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 1,
                actual: dims.len(),
            }));
        }
        Ok(vals)
    }

    // Booleans and bit fields.

    pub fn read_bool(&self, path: &str) -> Result<bool> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let plan = plan_full(a, ds)?;
            if plan.buf_elems != 1 {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "{path} is not a single boolean"
                ))));
            }
            let mut buf = vec![0_u8; ty.size()];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            match &ty {
                Datatype::Enumeration { names, .. } => {
                    let ords = crate::registry::decode_ordinals(&ty, &buf)?;
                    let name = names
                        .get(ords[0] as usize)
                        .ok_or_else(|| err(ErrorKind::OrdinalOutOfRange {
                            ordinal: ords[0],
                            cardinality: names.len(),
                        }))?;
                    if name.eq_ignore_ascii_case("TRUE") {
                        Ok(true)
                    } else if name.eq_ignore_ascii_case("FALSE") {
                        Ok(false)
                    } else {
                        Err(err(ErrorKind::TypeMismatch(format!(
                            "{path} holds enumeration value {name}, not a boolean"
                        ))))
                    }
                }
                Datatype::Integer { .. } => {
                    let vals = crate::registry::decode_ordinals(&ty, &buf)?;
                    Ok(vals[0] != 0)
                }
                _ => Err(err(ErrorKind::TypeMismatch(format!(
                    "{path} does not hold a boolean"
                )))),
            }
        })
    }

    pub fn read_bitfield(&self, path: &str) -> Result<BitField> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            if !matches!(ty, Datatype::BitField { .. }) {
                return Err(err(ErrorKind::TypeMismatch(format!(
                    "{path} does not hold a bit field"
                ))));
            }
            let plan = plan_full(a, ds)?;
            if plan.dims.len() > 1 {
                return Err(err(ErrorKind::RankMismatch {
                    expected: 1,
                    actual: plan.dims.len(),
                }));
            }
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let words = sediment_base::decode_vec::<u64>(&buf, Order::Little)?;
            Ok(BitField::from_storage_form(&words))
        })
    }

    /// Reads a 2-D bit-field table back into one set per row.
    pub fn read_bitfield_array(&self, path: &str) -> Result<Vec<BitField>> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let per_elem = match &ty {
                Datatype::BitField { words } => *words,
                _ => {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "{path} does not hold bit fields"
                    ))))
                }
            };
            let plan = plan_full(a, ds)?;
            if plan.dims.len() != 2 {
                return Err(err(ErrorKind::RankMismatch {
                    expected: 2,
                    actual: plan.dims.len(),
                }));
            }
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let words = sediment_base::decode_vec::<u64>(&buf, Order::Little)?;
            let width = plan.dims[1] as usize * per_elem;
            Ok(sediment_base::unpack_padded_rows(&words, width))
        })
    }

    // Enumerations.

    fn enum_type_of(&self, a: &Arena, ds: Hid, ty: &Datatype) -> Result<EnumType> {
        let name = a
            .binding()
            .dataset_type_path(ds)?
            .and_then(|p| p.rsplit('/').next().map(|s| s.to_string()))
            .unwrap_or_default();
        EnumType::from_datatype(name, ty)
    }

    pub fn read_enum(&self, path: &str) -> Result<EnumValue> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let et = self.enum_type_of(a, ds, &ty)?;
            let plan = plan_full(a, ds)?;
            if plan.buf_elems != 1 {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "{path} is not a single enumeration value"
                ))));
            }
            let mut buf = vec![0_u8; ty.size()];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let ords = crate::registry::decode_ordinals(&ty, &buf)?;
            EnumValue::new(et, ords[0])
        })
    }

    pub fn read_enum_as_string(&self, path: &str) -> Result<String> {
        Ok(self.read_enum(path)?.as_str().to_string())
    }

    pub fn read_enum_array(&self, path: &str) -> Result<EnumArray> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let et = self.enum_type_of(a, ds, &ty)?;
            let plan = plan_full(a, ds)?;
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            let ords = crate::registry::decode_ordinals(&ty, &buf)?;
            EnumArray::from_ordinals(et, plan.dims.clone(), &ords)
        })
    }

    // Opaque blobs.

    pub fn read_opaque(&self, path: &str) -> Result<(String, Vec<u8>)> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let tag = match &ty {
                Datatype::Opaque { tag, .. } => tag.clone(),
                _ => {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "{path} does not hold an opaque blob"
                    ))))
                }
            };
            let plan = plan_full(a, ds)?;
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            Ok((tag, buf))
        })
    }

    // Compound records.

    fn read_compound_raw(
        &self,
        registry: &FactoryRegistry,
        mode: AccessMode,
        path: &str,
    ) -> Result<(crate::compound::CompoundLayout, Vec<u64>, Vec<u8>)> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            let member_names: Vec<String> = match &ty {
                Datatype::Compound { members, .. } => {
                    members.iter().map(|m| m.name.clone()).collect()
                }
                _ => {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "{path} does not hold compound records"
                    ))))
                }
            };
            let mut variants: HashMap<String, TypeVariant> = HashMap::new();
            for name in &member_names {
                let attr = member_variant_attr(name);
                if let Some(v) =
                    Registry::read_variant(a.binding(), self.f.fh(), &path, &attr)?
                {
                    variants.insert(name.clone(), v);
                }
            }
            let layout =
                crate::compound::CompoundLayout::from_disk(registry, &ty, &variants, mode)?;
            let plan = plan_full(a, ds)?;
            let mut buf = vec![0_u8; ty.size() * plan.buf_elems];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            Ok((layout, plan.dims.clone(), buf))
        })
    }

    /// Reads compound records as string-keyed maps.
    pub fn read_compound(&self, path: &str) -> Result<Vec<Record>> {
        self.read_compound_with(&FactoryRegistry::standard(), AccessMode::Map, path)
    }

    /// Reads compound records under a caller-chosen factory registry and
    /// access mode.
    pub fn read_compound_with(
        &self,
        registry: &FactoryRegistry,
        mode: AccessMode,
        path: &str,
    ) -> Result<Vec<Record>> {
        let (layout, _, bytes) = self.read_compound_raw(registry, mode, path)?;
        layout.records_from_bytes(&bytes)
    }

    /// Reads compound records into caller-built values. Members the value
    /// type does not carry are discarded, so the file schema may be a
    /// superset of the host model.
    pub fn read_compound_into<R: FieldSource>(
        &self,
        path: &str,
        mut make: impl FnMut() -> R,
    ) -> Result<Vec<R>> {
        let recs = self.read_compound(path)?;
        let mut out = Vec::with_capacity(recs.len());
        for rec in recs {
            let mut host = make();
            if let Record::Mapped(fields) = rec {
                for (name, val) in fields {
                    host.set_field(&name, val);
                }
            }
            out.push(host);
        }
        Ok(out)
    }

    // Timestamps.

    fn require_timestamp(&self, path: &str) -> Result<()> {
        let variant = Registry::read_variant(self.b(), self.f.fh(), path, TYPE_VARIANT_ATTR)?;
        if variant != Some(TypeVariant::TimestampMillisecondsSinceEpoch) {
            return Err(err(ErrorKind::TypeMismatch(format!(
                "{path} is not tagged as a timestamp"
            ))));
        }
        Ok(())
    }

    /// Milliseconds since the epoch; the dataset must carry the matching
    /// type-variant tag.
    pub fn read_timestamp(&self, path: &str) -> Result<i64> {
        let path = norm(path)?;
        self.require_timestamp(&path)?;
        self.read_scalar::<i64>(&path)
    }

    pub fn read_timestamp_array(&self, path: &str) -> Result<Vec<i64>> {
        let path = norm(path)?;
        self.require_timestamp(&path)?;
        self.read_array::<i64>(&path)
    }

    // Object references.

    /// Reads an object reference. With `resolve`, the stored address is
    /// turned back into a path; otherwise the `\0<decimal>` encoded form
    /// is returned.
    pub fn read_reference(&self, path: &str, resolve: bool) -> Result<String> {
        let path = norm(path)?;
        let addr = with_arena(self.b(), |a| {
            let ds = self.open_ds(a, &path)?;
            let ty = a.binding().dataset_type(ds)?;
            if ty != Datatype::Reference {
                return Err(err(ErrorKind::NotAReference(path.clone())));
            }
            let plan = plan_full(a, ds)?;
            if plan.buf_elems != 1 {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "{path} is not a single reference"
                ))));
            }
            let mut buf = vec![0_u8; 8];
            a.binding()
                .read_dataset(ds, plan.mem_space, plan.file_space, &mut buf)?;
            Ok(take_at::<i64>(&buf, 0, Order::Little) as u64)
        })?;
        if !resolve {
            return Ok(format!("\0{addr}"));
        }
        self.b()
            .path_at_address(self.f.fh(), addr)?
            .ok_or_else(|| err(ErrorKind::NoSuchObject(format!("object address {addr}"))))
    }

    // Attributes.

    pub fn attr_exists(&self, path: &str, name: &str) -> Result<bool> {
        let path = norm(path)?;
        self.b().attr_exists(self.f.fh(), &path, name)
    }

    /// Attribute names, with reserved `__...__` names filtered out.
    pub fn attr_names(&self, path: &str) -> Result<Vec<String>> {
        let path = norm(path)?;
        Ok(self
            .b()
            .attr_names(self.f.fh(), &path)?
            .into_iter()
            .filter(|n| !n.starts_with("__"))
            .collect())
    }

    pub fn get_attr_array<T: Element>(&self, path: &str, name: &str) -> Result<Vec<T>> {
        let path = norm(path)?;
        let ty = self.b().attr_type(self.f.fh(), &path, name)?;
        let bytes = self.b().read_attr(self.f.fh(), &path, name)?;
        T::narrow(decode_disk(&ty, &bytes)?)
    }

    pub fn get_attr<T: Element>(&self, path: &str, name: &str) -> Result<T> {
        let vals = self.get_attr_array::<T>(path, name)?;
        if vals.len() != 1 {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "attribute {name} holds {} values",
                vals.len()
            ))));
        }
        Ok(vals[0])
    }

    pub fn get_bool_attr(&self, path: &str, name: &str) -> Result<bool> {
        let path = norm(path)?;
        let ty = self.b().attr_type(self.f.fh(), &path, name)?;
        let bytes = self.b().read_attr(self.f.fh(), &path, name)?;
        match &ty {
            Datatype::Enumeration { names, .. } => {
                let ords = crate::registry::decode_ordinals(&ty, &bytes)?;
                let value = names.get(ords[0] as usize).ok_or_else(|| {
                    err(ErrorKind::OrdinalOutOfRange {
                        ordinal: ords[0],
                        cardinality: names.len(),
                    })
                })?;
                if value.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if value.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(err(ErrorKind::TypeMismatch(format!(
                        "attribute {name} holds enumeration value {value}, not a boolean"
                    ))))
                }
            }
            Datatype::Integer { .. } => {
                Ok(crate::registry::decode_ordinals(&ty, &bytes)?[0] != 0)
            }
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "attribute {name} does not hold a boolean"
            )))),
        }
    }

    pub fn get_enum_attr(&self, path: &str, name: &str) -> Result<EnumValue> {
        let path = norm(path)?;
        let ty = self.b().attr_type(self.f.fh(), &path, name)?;
        let et = EnumType::from_datatype("", &ty)?;
        let bytes = self.b().read_attr(self.f.fh(), &path, name)?;
        let ords = crate::registry::decode_ordinals(&ty, &bytes)?;
        if ords.len() != 1 {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "attribute {name} holds {} values",
                ords.len()
            ))));
        }
        EnumValue::new(et, ords[0])
    }

    pub fn get_string_attr(&self, path: &str, name: &str) -> Result<String> {
        let path = norm(path)?;
        let ty = self.b().attr_type(self.f.fh(), &path, name)?;
        match ty {
            Datatype::FixedString { .. } => {
                let bytes = self.b().read_attr(self.f.fh(), &path, name)?;
                Ok(unpack_fixed_str(&bytes))
            }
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "attribute {name} does not hold a string"
            )))),
        }
    }
}

/// Iterator delivering one natural block of data per round-trip.
pub struct NaturalBlockReader<'f, T> {
    reader: Reader<'f>,
    path: String,
    blocks: NaturalBlocks,
    _elem: PhantomData<T>,
}

impl<T: Element> NaturalBlockReader<'_, T> {
    pub fn block_count(&self) -> u64 {
        self.blocks.block_count()
    }

    pub fn reset(&mut self) {
        self.blocks.reset();
    }
}

impl<T: Element> Iterator for NaturalBlockReader<'_, T> {
    type Item = Result<(NaturalBlock, MdArray<T>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.blocks.next()?;
        let read = self
            .reader
            .read_md_block_with_offset::<T>(&self.path, &block.dims, &block.offset);
        Some(read.map(|arr| (block, arr)))
    }
}
