// The typed write surface. Dataset creation picks a storage layout from
// the request (explicit chunks, deflate, extendability, the compact
// threshold); overwriting an existing dataset extends it in place when
// the stored max-dimensions allow and replaces it otherwise. Writes into
// an existing dataset convert to its stored width, so rewriting an i16
// dataset from i32 data narrows instead of recreating.

use sediment_base::{encode_vec, err, BitField, ErrorKind, Order, Result};

use crate::arena::{with_arena, Arena};
use crate::binding::{Binding, Hid, StorageLayout, TypeRef};
use crate::compound::{CompoundLayout, Record};
use crate::dataspace::{plan_block, plan_full};
use crate::datatype::{Datatype, TypeClass, UNLIMITED};
use crate::elem::{encode_for_disk, pack_fixed_str, Element};
use crate::enums::{EnumArray, EnumType, EnumValue};
use crate::file::{norm, H5File, DEFAULT_DEFLATE};
use crate::mdarray::{element_count, MdArray};
use crate::registry::{
    enum_type_path, member_variant_attr, opaque_type_path, TypeVariant, TYPE_VARIANT_ATTR,
    VAR_STRING_PATH,
};

/// Creation options for new datasets. The default asks for nothing and
/// lets the writer pick compact or contiguous storage by size.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct DatasetOptions {
    /// Explicit chunk shape; implies chunked storage.
    pub chunks: Option<Vec<u64>>,
    /// gzip level 0-9; implies chunked storage.
    pub deflate: Option<u8>,
    /// Force compact storage regardless of size.
    pub compact: bool,
    /// Unlimited max-dimensions; implies chunked storage.
    pub extendable: bool,
}

impl DatasetOptions {
    pub fn chunked(chunks: &[u64]) -> DatasetOptions {
        DatasetOptions {
            chunks: Some(chunks.to_vec()),
            ..Default::default()
        }
    }

    pub fn deflate(level: u8) -> DatasetOptions {
        DatasetOptions {
            deflate: Some(level),
            ..Default::default()
        }
    }

    /// gzip at the default level.
    pub fn compressed() -> DatasetOptions {
        DatasetOptions::deflate(DEFAULT_DEFLATE)
    }

    pub fn compact() -> DatasetOptions {
        DatasetOptions {
            compact: true,
            ..Default::default()
        }
    }

    pub fn extendable() -> DatasetOptions {
        DatasetOptions {
            extendable: true,
            ..Default::default()
        }
    }

    pub fn with_deflate(mut self, level: u8) -> DatasetOptions {
        self.deflate = Some(level);
        self
    }
}

/// Write view of an open file.
#[derive(Clone, Copy)]
pub struct Writer<'f> {
    f: &'f H5File,
}

impl std::fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer").finish_non_exhaustive()
    }
}

// A stored dataset can absorb a rewrite of the same class; numerics
// convert across widths, everything else must match exactly.
fn reusable(stored: &Datatype, wanted: &Datatype) -> bool {
    matches!(
        (stored.class(), wanted.class()),
        (TypeClass::Integer, TypeClass::Integer) | (TypeClass::Float, TypeClass::Float)
    ) || stored == wanted
}

fn floor_pow2(v: u64) -> u64 {
    if v <= 1 {
        1
    } else {
        1_u64 << (63 - v.leading_zeros())
    }
}

/// Power-of-two chunk shape targeting ~64 KiB per chunk, never exceeding
/// an axis length.
fn default_chunks(dims: &[u64], elem_size: usize) -> Vec<u64> {
    let target = (64 * 1024 / elem_size.max(1)).max(1) as u64;
    let mut chunk: Vec<u64> = dims.iter().map(|d| floor_pow2(*d)).collect();
    loop {
        let prod: u64 = chunk.iter().product();
        if prod <= target {
            return chunk;
        }
        let mut largest = None;
        for (k, c) in chunk.iter().enumerate() {
            if *c > 1 && largest.map(|(_, m)| *c > m).unwrap_or(true) {
                largest = Some((k, *c));
            }
        }
        match largest {
            Some((k, _)) => chunk[k] /= 2,
            None => return chunk,
        }
    }
}

impl<'f> Writer<'f> {
    pub(crate) fn new(f: &'f H5File) -> Writer<'f> {
        Writer { f }
    }

    fn b(&self) -> &dyn Binding {
        self.f.binding()
    }

    fn fh(&self) -> Hid {
        self.f.fh()
    }

    /// Opens the dataset at `path` for an overwrite of `dims`, creating,
    /// extending, or replacing it as the stored shape and layout allow.
    fn ensure_dataset(
        &self,
        a: &Arena,
        path: &str,
        ty: &TypeRef,
        dims: &[u64],
        scalar: bool,
        opts: &DatasetOptions,
    ) -> Result<Hid> {
        let b = a.binding();
        let fh = self.fh();
        if let Some(level) = opts.deflate {
            if level > 9 {
                return Err(err(ErrorKind::LayoutUnsupported(format!(
                    "deflate level {level}"
                ))));
            }
        }
        let wanted = match ty {
            TypeRef::Inline(t) => t.clone(),
            TypeRef::Committed(p) => b.open_datatype(fh, p)?,
        };
        if b.exists(fh, path)? {
            if b.object_kind(fh, path)? != crate::binding::ObjectKind::Dataset {
                return Err(err(ErrorKind::NotADataset(path.to_string())));
            }
            let ds = a.adopt(b.open_dataset(fh, path)?);
            let space = a.adopt(b.dataset_space(ds)?);
            let (cur, max) = b.space_dims(space)?;
            let (layout, _) = b.dataset_layout(ds)?;
            let stored = b.dataset_type(ds)?;
            let rank_ok = cur.len() == dims.len();
            let fits = rank_ok
                && dims
                    .iter()
                    .zip(&max)
                    .all(|(d, m)| *m == UNLIMITED || d <= m);
            let shrinks = rank_ok && dims.iter().zip(&cur).any(|(d, c)| d < c);
            if reusable(&stored, &wanted) && rank_ok && cur == dims {
                if layout == StorageLayout::Contiguous && b.version() == (1, 8, 1) {
                    // Writing into contiguous storage corrupts under
                    // 1.8.1 unless the file is flushed first.
                    b.flush_file(fh)?;
                }
                return Ok(ds);
            }
            if reusable(&stored, &wanted) && fits && !shrinks && layout == StorageLayout::Chunked
            {
                b.set_extent(ds, dims)?;
                return Ok(ds);
            }
            if !fits && !self.f.opts().latest_format {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "shape {dims:?} does not fit stored max-dimensions {max:?}"
                ))));
            }
            b.delete_link(fh, path)?;
        }
        let total = element_count(dims)?;
        let es = wanted.size();
        let (layout, chunk) = if scalar {
            (StorageLayout::Compact, None)
        } else if let Some(c) = &opts.chunks {
            (StorageLayout::Chunked, Some(c.clone()))
        } else if opts.deflate.is_some() || opts.extendable {
            (StorageLayout::Chunked, Some(default_chunks(dims, es)))
        } else if opts.compact || es * total < self.f.opts().compact_threshold {
            (StorageLayout::Compact, None)
        } else {
            (StorageLayout::Contiguous, None)
        };
        let space = if scalar {
            a.adopt(b.create_scalar_space()?)
        } else {
            let max: Vec<u64> = if layout == StorageLayout::Chunked {
                vec![UNLIMITED; dims.len()]
            } else {
                dims.to_vec()
            };
            a.adopt(b.create_simple_space(dims, &max)?)
        };
        let ds = a.adopt(b.create_dataset(
            fh,
            path,
            ty,
            space,
            layout,
            chunk.as_deref(),
            opts.deflate,
        )?);
        Ok(ds)
    }

    fn write_elems<T: Element>(
        &self,
        path: &str,
        dims: &[u64],
        scalar: bool,
        data: &[T],
        opts: &DatasetOptions,
    ) -> Result<()> {
        let path = norm(path)?;
        if data.len() != element_count(dims)? {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "{} elements for shape {:?}",
                data.len(),
                dims
            ))));
        }
        with_arena(self.b(), |a| {
            let ds =
                self.ensure_dataset(a, &path, &TypeRef::Inline(T::disk_type()), dims, scalar, opts)?;
            let stored = a.binding().dataset_type(ds)?;
            let bytes = encode_for_disk(&stored, &T::widen(data))?;
            let plan = plan_full(a, ds)?;
            a.binding()
                .write_dataset(ds, plan.mem_space, plan.file_space, &bytes)
        })
    }

    fn write_raw(
        &self,
        path: &str,
        ty: &TypeRef,
        dims: &[u64],
        scalar: bool,
        opts: &DatasetOptions,
        bytes: &[u8],
    ) -> Result<()> {
        with_arena(self.b(), |a| {
            let ds = self.ensure_dataset(a, path, ty, dims, scalar, opts)?;
            let plan = plan_full(a, ds)?;
            a.binding()
                .write_dataset(ds, plan.mem_space, plan.file_space, bytes)
        })
    }

    // Generic numeric writes.

    pub fn write_scalar<T: Element>(&self, path: &str, val: T) -> Result<()> {
        self.write_elems(path, &[], true, &[val], &DatasetOptions::default())
    }

    pub fn write_array<T: Element>(&self, path: &str, data: &[T]) -> Result<()> {
        self.write_array_with(path, data, &DatasetOptions::default())
    }

    pub fn write_array_with<T: Element>(
        &self,
        path: &str,
        data: &[T],
        opts: &DatasetOptions,
    ) -> Result<()> {
        self.write_elems(path, &[data.len() as u64], false, data, opts)
    }

    pub fn write_array_compact<T: Element>(&self, path: &str, data: &[T]) -> Result<()> {
        self.write_array_with(path, data, &DatasetOptions::compact())
    }

    pub fn write_matrix<T: Element>(&self, path: &str, data: &MdArray<T>) -> Result<()> {
        self.write_matrix_with(path, data, &DatasetOptions::default())
    }

    pub fn write_matrix_with<T: Element>(
        &self,
        path: &str,
        data: &MdArray<T>,
        opts: &DatasetOptions,
    ) -> Result<()> {
        if data.rank() != 2 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 2,
                actual: data.rank(),
            }));
        }
        self.write_elems(path, data.dims(), false, data.data(), opts)
    }

    pub fn write_md_array<T: Element>(&self, path: &str, data: &MdArray<T>) -> Result<()> {
        self.write_md_array_with(path, data, &DatasetOptions::default())
    }

    pub fn write_md_array_with<T: Element>(
        &self,
        path: &str,
        data: &MdArray<T>,
        opts: &DatasetOptions,
    ) -> Result<()> {
        self.write_elems(path, data.dims(), data.rank() == 0, data.data(), opts)
    }

    // Creation without data.

    pub fn create_array<T: Element>(
        &self,
        path: &str,
        size: u64,
        opts: &DatasetOptions,
    ) -> Result<()> {
        self.create_md_array::<T>(path, &[size], opts)
    }

    pub fn create_matrix<T: Element>(
        &self,
        path: &str,
        dims: (u64, u64),
        opts: &DatasetOptions,
    ) -> Result<()> {
        self.create_md_array::<T>(path, &[dims.0, dims.1], opts)
    }

    pub fn create_md_array<T: Element>(
        &self,
        path: &str,
        dims: &[u64],
        opts: &DatasetOptions,
    ) -> Result<()> {
        let path = norm(path)?;
        with_arena(self.b(), |a| {
            self.ensure_dataset(a, &path, &TypeRef::Inline(T::disk_type()), dims, false, opts)
                .map(|_| ())
        })
    }

    // Block writes into existing datasets, extending when allowed.

    fn write_block_elems<T: Element>(
        &self,
        path: &str,
        offset: &[u64],
        block_dims: &[u64],
        data: &[T],
    ) -> Result<()> {
        let path = norm(path)?;
        if data.len() != element_count(block_dims)? {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "{} elements for block shape {:?}",
                data.len(),
                block_dims
            ))));
        }
        with_arena(self.b(), |a| {
            let b = a.binding();
            let fh = self.fh();
            if !b.exists(fh, &path)? {
                return Err(err(ErrorKind::NoSuchObject(path.clone())));
            }
            let ds = a.adopt(b.open_dataset(fh, &path)?);
            let space = a.adopt(b.dataset_space(ds)?);
            let (cur, max) = b.space_dims(space)?;
            if offset.len() != cur.len() || block_dims.len() != cur.len() {
                return Err(err(ErrorKind::RankMismatch {
                    expected: cur.len(),
                    actual: offset.len().max(block_dims.len()),
                }));
            }
            let needed: Vec<u64> = cur
                .iter()
                .zip(offset.iter().zip(block_dims))
                .map(|(c, (o, d))| (*c).max(o + d))
                .collect();
            if needed != cur {
                for (k, (n, m)) in needed.iter().zip(&max).enumerate() {
                    if *m != UNLIMITED && n > m {
                        return Err(err(ErrorKind::ShapeMismatch(format!(
                            "block end {n} exceeds max {m} on axis {k}"
                        ))));
                    }
                }
                b.set_extent(ds, &needed)?;
            }
            let plan = plan_block(a, ds, offset, block_dims)?;
            let stored = b.dataset_type(ds)?;
            let bytes = encode_for_disk(&stored, &T::widen(data))?;
            b.write_dataset(ds, plan.mem_space, plan.file_space, &bytes)
        })
    }

    pub fn write_array_block<T: Element>(
        &self,
        path: &str,
        data: &[T],
        block_index: u64,
    ) -> Result<()> {
        let size = data.len() as u64;
        self.write_block_elems(path, &[size * block_index], &[size], data)
    }

    pub fn write_array_block_with_offset<T: Element>(
        &self,
        path: &str,
        data: &[T],
        offset: u64,
    ) -> Result<()> {
        self.write_block_elems(path, &[offset], &[data.len() as u64], data)
    }

    pub fn write_matrix_block<T: Element>(
        &self,
        path: &str,
        data: &MdArray<T>,
        block_index: (u64, u64),
    ) -> Result<()> {
        if data.rank() != 2 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 2,
                actual: data.rank(),
            }));
        }
        let offset = [
            data.dims()[0] * block_index.0,
            data.dims()[1] * block_index.1,
        ];
        self.write_block_elems(path, &offset, data.dims(), data.data())
    }

    pub fn write_matrix_block_with_offset<T: Element>(
        &self,
        path: &str,
        data: &MdArray<T>,
        offset: (u64, u64),
    ) -> Result<()> {
        if data.rank() != 2 {
            return Err(err(ErrorKind::RankMismatch {
                expected: 2,
                actual: data.rank(),
            }));
        }
        self.write_block_elems(path, &[offset.0, offset.1], data.dims(), data.data())
    }

    pub fn write_md_block<T: Element>(
        &self,
        path: &str,
        data: &MdArray<T>,
        block_index: &[u64],
    ) -> Result<()> {
        if block_index.len() != data.rank() {
            return Err(err(ErrorKind::RankMismatch {
                expected: data.rank(),
                actual: block_index.len(),
            }));
        }
        let offset: Vec<u64> = data
            .dims()
            .iter()
            .zip(block_index)
            .map(|(d, i)| d * i)
            .collect();
        self.write_block_elems(path, &offset, data.dims(), data.data())
    }

    pub fn write_md_block_with_offset<T: Element>(
        &self,
        path: &str,
        data: &MdArray<T>,
        offset: &[u64],
    ) -> Result<()> {
        self.write_block_elems(path, offset, data.dims(), data.data())
    }

    // Strings.

    /// Fixed-length string sized to the value (terminator included).
    pub fn write_string(&self, path: &str, val: &str) -> Result<()> {
        self.write_string_fixed(path, val, val.len() + 1)
    }

    pub fn write_string_fixed(&self, path: &str, val: &str, len: usize) -> Result<()> {
        let path = norm(path)?;
        self.write_raw(
            &path,
            &TypeRef::Inline(Datatype::fixed_string(len.max(1))),
            &[],
            true,
            &DatasetOptions::default(),
            &pack_fixed_str(val, len.max(1)),
        )
    }

    pub fn write_string_array<S: AsRef<str>>(&self, path: &str, vals: &[S]) -> Result<()> {
        let path = norm(path)?;
        let len = vals
            .iter()
            .map(|s| s.as_ref().len())
            .max()
            .unwrap_or(0)
            + 1;
        let mut bytes = Vec::with_capacity(len * vals.len());
        for s in vals {
            bytes.extend_from_slice(&pack_fixed_str(s.as_ref(), len));
        }
        self.write_raw(
            &path,
            &TypeRef::Inline(Datatype::fixed_string(len)),
            &[vals.len() as u64],
            false,
            &DatasetOptions::default(),
            &bytes,
        )
    }

    /// Variable-length string through the committed vlen type.
    pub fn write_string_var(&self, path: &str, val: &str) -> Result<()> {
        self.write_strings_var(path, &[], true, &[val.to_string()])
    }

    pub fn write_string_array_var<S: AsRef<str>>(&self, path: &str, vals: &[S]) -> Result<()> {
        let owned: Vec<String> = vals.iter().map(|s| s.as_ref().to_string()).collect();
        self.write_strings_var(path, &[vals.len() as u64], false, &owned)
    }

    fn write_strings_var(
        &self,
        path: &str,
        dims: &[u64],
        scalar: bool,
        vals: &[String],
    ) -> Result<()> {
        let path = norm(path)?;
        self.f
            .registry()
            .borrow_mut()
            .var_string(self.b(), self.fh())?;
        with_arena(self.b(), |a| {
            let ds = self.ensure_dataset(
                a,
                &path,
                &TypeRef::Committed(VAR_STRING_PATH.to_string()),
                dims,
                scalar,
                &DatasetOptions::default(),
            )?;
            let plan = plan_full(a, ds)?;
            a.binding()
                .write_strings(ds, plan.mem_space, plan.file_space, vals)
        })
    }

    // Booleans and bit fields.

    pub fn write_bool(&self, path: &str, val: bool) -> Result<()> {
        let path = norm(path)?;
        self.f
            .registry()
            .borrow_mut()
            .boolean(self.b(), self.fh())?;
        self.write_raw(
            &path,
            &TypeRef::Committed(enum_type_path("Boolean")),
            &[],
            true,
            &DatasetOptions::default(),
            &[val as u8],
        )
    }

    pub fn write_bitfield(&self, path: &str, val: &BitField) -> Result<()> {
        let path = norm(path)?;
        let words = val.to_storage_form();
        self.write_raw(
            &path,
            &TypeRef::Inline(Datatype::BitField { words: 1 }),
            &[words.len() as u64],
            false,
            &DatasetOptions::default(),
            &encode_vec(&words, Order::Little),
        )
    }

    /// Writes several bit fields as one 2-D table, each row padded to the
    /// widest set.
    pub fn write_bitfield_array(&self, path: &str, vals: &[BitField]) -> Result<()> {
        let path = norm(path)?;
        let (width, flat) = sediment_base::pack_padded_rows(vals);
        self.write_raw(
            &path,
            &TypeRef::Inline(Datatype::BitField { words: 1 }),
            &[vals.len() as u64, width as u64],
            false,
            &DatasetOptions::default(),
            &encode_vec(&flat, Order::Little),
        )
    }

    // Enumerations.

    /// Resolves (committing on first use) the named enumeration type.
    /// With `check`, an existing committed type must carry exactly these
    /// values in order.
    pub fn enum_type(&self, name: &str, values: &[&str], check: bool) -> Result<EnumType> {
        let owned: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let ty = self
            .f
            .registry()
            .borrow_mut()
            .committed_enum(self.b(), self.fh(), name, &owned, check)?;
        EnumType::from_datatype(name, &ty)
    }

    pub fn write_enum(&self, path: &str, val: &EnumValue) -> Result<()> {
        let path = norm(path)?;
        let values: Vec<&str> = val.ty().values().iter().map(|s| s.as_str()).collect();
        let et = self.enum_type(val.ty().name(), &values, true)?;
        let committed = et.datatype()?;
        let bytes = crate::registry::encode_ordinals(&committed, &[val.ordinal() as i64])?;
        self.write_raw(
            &path,
            &TypeRef::Committed(enum_type_path(val.ty().name())),
            &[],
            true,
            &DatasetOptions::default(),
            &bytes,
        )
    }

    pub fn write_enum_array(&self, path: &str, vals: &EnumArray) -> Result<()> {
        self.write_enum_array_with(path, vals, &DatasetOptions::default())
    }

    pub fn write_enum_array_with(
        &self,
        path: &str,
        vals: &EnumArray,
        opts: &DatasetOptions,
    ) -> Result<()> {
        let path = norm(path)?;
        let values: Vec<&str> = vals.ty().values().iter().map(|s| s.as_str()).collect();
        let et = self.enum_type(vals.ty().name(), &values, true)?;
        let committed = et.datatype()?;
        let bytes = crate::registry::encode_ordinals(&committed, &vals.ordinals())?;
        self.write_raw(
            &path,
            &TypeRef::Committed(enum_type_path(vals.ty().name())),
            vals.dims(),
            false,
            opts,
            &bytes,
        )
    }

    // Opaque blobs.

    pub fn write_opaque(&self, path: &str, tag: &str, data: &[u8]) -> Result<()> {
        let path = norm(path)?;
        self.f
            .registry()
            .borrow_mut()
            .opaque(self.b(), self.fh(), tag, data.len())?;
        self.write_raw(
            &path,
            &TypeRef::Committed(opaque_type_path(tag)),
            &[],
            true,
            &DatasetOptions::default(),
            data,
        )
    }

    // Compound records.

    pub fn write_compound(
        &self,
        path: &str,
        layout: &CompoundLayout,
        recs: &[Record],
    ) -> Result<()> {
        let path = norm(path)?;
        let ty = layout.disk_type()?;
        let bytes = layout.byteify_all(recs)?;
        self.write_raw(
            &path,
            &TypeRef::Inline(ty),
            &[recs.len() as u64],
            false,
            &DatasetOptions::default(),
            &bytes,
        )?;
        let mut registry = self.f.registry().borrow_mut();
        for (name, variant) in layout.member_variants() {
            registry.tag_variant(
                self.b(),
                self.fh(),
                &path,
                &member_variant_attr(&name),
                variant,
            )?;
        }
        Ok(())
    }

    // Timestamps.

    pub fn write_timestamp(&self, path: &str, millis: i64) -> Result<()> {
        let path = norm(path)?;
        self.write_scalar(&path, millis)?;
        self.f.registry().borrow_mut().tag_variant(
            self.b(),
            self.fh(),
            &path,
            TYPE_VARIANT_ATTR,
            TypeVariant::TimestampMillisecondsSinceEpoch,
        )
    }

    pub fn write_timestamp_array(&self, path: &str, millis: &[i64]) -> Result<()> {
        let path = norm(path)?;
        self.write_array(&path, millis)?;
        self.f.registry().borrow_mut().tag_variant(
            self.b(),
            self.fh(),
            &path,
            TYPE_VARIANT_ATTR,
            TypeVariant::TimestampMillisecondsSinceEpoch,
        )
    }

    // Object references.

    /// Stores a reference to the object at `target` as its address.
    pub fn write_reference(&self, path: &str, target: &str) -> Result<()> {
        let path = norm(path)?;
        let target = norm(target)?;
        let addr = self.b().object_address(self.fh(), &target)?;
        self.write_raw(
            &path,
            &TypeRef::Inline(Datatype::Reference),
            &[],
            true,
            &DatasetOptions::default(),
            &encode_vec(&[addr as i64], Order::Little),
        )
    }

    // Groups and links.

    pub fn create_group(&self, path: &str) -> Result<()> {
        let path = norm(path)?;
        self.b().create_group(self.fh(), &path)
    }

    pub fn create_soft_link(&self, target: &str, link: &str) -> Result<()> {
        let target = norm(target)?;
        let link = norm(link)?;
        self.b().create_soft_link(self.fh(), &target, &link)
    }

    /// External links require the latest file format.
    pub fn create_external_link(
        &self,
        target_file: &str,
        target_path: &str,
        link: &str,
    ) -> Result<()> {
        if !self.f.opts().latest_format {
            return Err(err(ErrorKind::LayoutUnsupported(
                "external links need the latest file format".into(),
            )));
        }
        let link = norm(link)?;
        self.b()
            .create_external_link(self.fh(), target_file, target_path, &link)
    }

    /// Unlinks the object at `path`.
    pub fn delete(&self, path: &str) -> Result<()> {
        let path = norm(path)?;
        self.b().delete_link(self.fh(), &path)
    }

    // Attributes. Addition is idempotent: an existing attribute of the
    // same shape is overwritten in place, anything else is recreated.

    fn put_attr_raw(
        &self,
        path: &str,
        name: &str,
        ty: &TypeRef,
        dims: Option<&[u64]>,
        bytes: &[u8],
    ) -> Result<()> {
        let b = self.b();
        let fh = self.fh();
        if !b.exists(fh, path)? {
            return Err(err(ErrorKind::NoSuchObject(path.to_string())));
        }
        let wanted = match ty {
            TypeRef::Inline(t) => t.clone(),
            TypeRef::Committed(p) => b.open_datatype(fh, p)?,
        };
        if b.attr_exists(fh, path, name)? {
            let stored = b.attr_type(fh, path, name)?;
            let stored_dims = b.attr_dims(fh, path, name)?;
            if stored == wanted && stored_dims.as_deref() == dims {
                return b.write_attr(fh, path, name, bytes);
            }
            b.delete_attr(fh, path, name)?;
        }
        b.create_attr(fh, path, name, ty, dims)?;
        b.write_attr(fh, path, name, bytes)
    }

    pub fn set_attr<T: Element>(&self, path: &str, name: &str, val: T) -> Result<()> {
        let path = norm(path)?;
        let ty = T::disk_type();
        let bytes = encode_for_disk(&ty, &T::widen(&[val]))?;
        self.put_attr_raw(&path, name, &TypeRef::Inline(ty), None, &bytes)
    }

    pub fn set_attr_array<T: Element>(&self, path: &str, name: &str, vals: &[T]) -> Result<()> {
        let path = norm(path)?;
        let ty = T::disk_type();
        let bytes = encode_for_disk(&ty, &T::widen(vals))?;
        self.put_attr_raw(
            &path,
            name,
            &TypeRef::Inline(ty),
            Some(&[vals.len() as u64]),
            &bytes,
        )
    }

    pub fn set_bool_attr(&self, path: &str, name: &str, val: bool) -> Result<()> {
        let path = norm(path)?;
        self.f
            .registry()
            .borrow_mut()
            .boolean(self.b(), self.fh())?;
        self.put_attr_raw(
            &path,
            name,
            &TypeRef::Committed(enum_type_path("Boolean")),
            None,
            &[val as u8],
        )
    }

    pub fn set_enum_attr(&self, path: &str, name: &str, val: &EnumValue) -> Result<()> {
        let path = norm(path)?;
        let values: Vec<&str> = val.ty().values().iter().map(|s| s.as_str()).collect();
        let et = self.enum_type(val.ty().name(), &values, true)?;
        let bytes = crate::registry::encode_ordinals(&et.datatype()?, &[val.ordinal() as i64])?;
        self.put_attr_raw(
            &path,
            name,
            &TypeRef::Committed(enum_type_path(val.ty().name())),
            None,
            &bytes,
        )
    }

    pub fn set_string_attr(&self, path: &str, name: &str, val: &str) -> Result<()> {
        let path = norm(path)?;
        let len = val.len() + 1;
        self.put_attr_raw(
            &path,
            name,
            &TypeRef::Inline(Datatype::fixed_string(len)),
            None,
            &pack_fixed_str(val, len),
        )
    }

    pub fn delete_attr(&self, path: &str, name: &str) -> Result<()> {
        let path = norm(path)?;
        self.b().delete_attr(self.fh(), &path, name)
    }
}
