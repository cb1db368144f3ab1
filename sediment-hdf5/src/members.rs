// Member encoders and the factory registry behind CompoundLayout. A
// factory answers can_handle for host kinds and, for reads, may claim an
// on-disk class through kind_for_disk; registration order is priority and
// the first positive answer wins, so the timestamp factory precedes the
// plain numeric one and captures variant-tagged i64 members.

use sediment_base::{
    decode_vec, encode_into, err, put_at, take_at, BitField, ErrorKind, Order, Result,
};

use crate::compound::{FieldValue, HostKind, Record, Slot};
use crate::datatype::Datatype;
use crate::enums::EnumType;
use crate::registry::TypeVariant;

/// Construction context every factory receives: addressing, layout
/// position, and whether a missing field is tolerated (FIELD access).
#[derive(Clone, Debug)]
pub struct MemberCtx {
    pub name: String,
    pub slot: Slot,
    pub offset: usize,
    pub lenient: bool,
}

impl MemberCtx {
    fn fetch(&self, rec: &Record) -> Result<Option<FieldValue>> {
        match rec.get(&self.slot) {
            Some(v) => Ok(Some(v)),
            // The dummy path: a zero-filled slot of the true size keeps
            // the record layout intact for models missing this field.
            None if self.lenient => Ok(None),
            None => Err(err(ErrorKind::TypeMismatch(format!(
                "record carries no value for member {}",
                self.slot
            )))),
        }
    }

    fn bad_value(&self, got: &FieldValue) -> sediment_base::Error {
        err(ErrorKind::TypeMismatch(format!(
            "member {} cannot encode {:?}",
            self.slot, got
        )))
    }
}

pub trait MemberEncoder {
    fn name(&self) -> &str;
    fn offset(&self) -> usize;
    fn size(&self) -> usize;
    /// The on-disk type of this member.
    fn storage_type(&self) -> Datatype;
    /// A semantic annotation to stamp on the containing dataset.
    fn variant(&self) -> Option<TypeVariant> {
        None
    }
    /// Packs this member's field into its slice (`out.len() == size`).
    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()>;
    /// Unpacks this member's slice into the record; values the record
    /// cannot hold are discarded.
    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()>;
}

pub trait MemberFactory {
    fn can_handle(&self, kind: &HostKind) -> bool;
    fn build(&self, ctx: MemberCtx, kind: &HostKind) -> Result<Box<dyn MemberEncoder>>;
    /// Maps an on-disk member type back to a host kind, or passes.
    fn kind_for_disk(&self, ty: &Datatype, variant: Option<TypeVariant>) -> Option<HostKind>;
}

/// Priority-ordered factory list; order of registration is order of
/// consultation.
pub struct FactoryRegistry {
    factories: Vec<Box<dyn MemberFactory>>,
}

impl FactoryRegistry {
    /// The built-in factories. The timestamp factory must precede the
    /// numeric one so tagged i64 members resolve as timestamps.
    pub fn standard() -> FactoryRegistry {
        FactoryRegistry {
            factories: vec![
                Box::new(TimeFactory),
                Box::new(NumericFactory),
                Box::new(StringFactory),
                Box::new(EnumFactory),
                Box::new(BitsFactory),
                Box::new(OpaqueFactory),
            ],
        }
    }

    pub fn register_front(&mut self, f: Box<dyn MemberFactory>) {
        self.factories.insert(0, f);
    }

    pub fn register(&mut self, f: Box<dyn MemberFactory>) {
        self.factories.push(f);
    }

    pub(crate) fn choose(&self, kind: &HostKind) -> Result<&dyn MemberFactory> {
        self.factories
            .iter()
            .map(|f| f.as_ref())
            .find(|f| f.can_handle(kind))
            .ok_or_else(|| {
                err(ErrorKind::TypeMismatch(format!(
                    "no member factory handles {kind:?}"
                )))
            })
    }

    pub(crate) fn kind_for_disk(
        &self,
        ty: &Datatype,
        variant: Option<TypeVariant>,
    ) -> Result<HostKind> {
        self.factories
            .iter()
            .find_map(|f| f.kind_for_disk(ty, variant))
            .ok_or_else(|| {
                err(ErrorKind::TypeMismatch(format!(
                    "no member factory maps datatype class {:?}",
                    ty.class()
                )))
            })
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        FactoryRegistry::standard()
    }
}

// Fixed-width numerics.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NumKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl NumKind {
    fn of(kind: &HostKind) -> Option<NumKind> {
        match kind {
            HostKind::Int8 => Some(NumKind::I8),
            HostKind::Int16 => Some(NumKind::I16),
            HostKind::Int32 => Some(NumKind::I32),
            HostKind::Int64 => Some(NumKind::I64),
            HostKind::Float32 => Some(NumKind::F32),
            HostKind::Float64 => Some(NumKind::F64),
            _ => None,
        }
    }

    fn size(self) -> usize {
        match self {
            NumKind::I8 => 1,
            NumKind::I16 => 2,
            NumKind::I32 => 4,
            NumKind::I64 => 8,
            NumKind::F32 => 4,
            NumKind::F64 => 8,
        }
    }

    fn storage(self) -> Datatype {
        match self {
            NumKind::I8 => Datatype::le_int(1, true),
            NumKind::I16 => Datatype::le_int(2, true),
            NumKind::I32 => Datatype::le_int(4, true),
            NumKind::I64 => Datatype::le_int(8, true),
            NumKind::F32 => Datatype::le_float(4),
            NumKind::F64 => Datatype::le_float(8),
        }
    }
}

struct NumericEncoder {
    ctx: MemberCtx,
    kind: NumKind,
}

impl MemberEncoder for NumericEncoder {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn offset(&self) -> usize {
        self.ctx.offset
    }

    fn size(&self) -> usize {
        self.kind.size()
    }

    fn storage_type(&self) -> Datatype {
        self.kind.storage()
    }

    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        let val = match self.ctx.fetch(rec)? {
            Some(v) => v,
            None => return Ok(()),
        };
        match (self.kind, &val) {
            (NumKind::I8, FieldValue::Int8(v)) => put_at(out, 0, *v, Order::Little),
            (NumKind::I16, FieldValue::Int16(v)) => put_at(out, 0, *v, Order::Little),
            (NumKind::I32, FieldValue::Int32(v)) => put_at(out, 0, *v, Order::Little),
            (NumKind::I64, FieldValue::Int64(v)) => put_at(out, 0, *v, Order::Little),
            (NumKind::F32, FieldValue::Float32(v)) => put_at(out, 0, *v, Order::Little),
            (NumKind::F64, FieldValue::Float64(v)) => put_at(out, 0, *v, Order::Little),
            _ => return Err(self.ctx.bad_value(&val)),
        }
        Ok(())
    }

    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        let val = match self.kind {
            NumKind::I8 => FieldValue::Int8(take_at(bytes, 0, Order::Little)),
            NumKind::I16 => FieldValue::Int16(take_at(bytes, 0, Order::Little)),
            NumKind::I32 => FieldValue::Int32(take_at(bytes, 0, Order::Little)),
            NumKind::I64 => FieldValue::Int64(take_at(bytes, 0, Order::Little)),
            NumKind::F32 => FieldValue::Float32(take_at(bytes, 0, Order::Little)),
            NumKind::F64 => FieldValue::Float64(take_at(bytes, 0, Order::Little)),
        };
        rec.put(&self.ctx.slot, val);
        Ok(())
    }
}

struct NumericFactory;

impl MemberFactory for NumericFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        NumKind::of(kind).is_some()
    }

    fn build(&self, ctx: MemberCtx, kind: &HostKind) -> Result<Box<dyn MemberEncoder>> {
        let kind = NumKind::of(kind)
            .ok_or_else(|| err(ErrorKind::TypeMismatch(format!("not numeric: {kind:?}"))))?;
        Ok(Box::new(NumericEncoder { ctx, kind }))
    }

    fn kind_for_disk(&self, ty: &Datatype, _variant: Option<TypeVariant>) -> Option<HostKind> {
        match ty {
            Datatype::Integer { width: 1, .. } => Some(HostKind::Int8),
            Datatype::Integer { width: 2, .. } => Some(HostKind::Int16),
            Datatype::Integer { width: 4, .. } => Some(HostKind::Int32),
            Datatype::Integer { width: 8, .. } => Some(HostKind::Int64),
            Datatype::Float { width: 4, .. } => Some(HostKind::Float32),
            Datatype::Float { width: 8, .. } => Some(HostKind::Float64),
            _ => None,
        }
    }
}

// Fixed-length strings, NUL-padded; overflow truncates.

struct StringEncoder {
    ctx: MemberCtx,
    len: usize,
}

impl MemberEncoder for StringEncoder {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn offset(&self) -> usize {
        self.ctx.offset
    }

    fn size(&self) -> usize {
        self.len
    }

    fn storage_type(&self) -> Datatype {
        Datatype::fixed_string(self.len)
    }

    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        let val = match self.ctx.fetch(rec)? {
            Some(v) => v,
            None => return Ok(()),
        };
        match &val {
            FieldValue::Text(s) => {
                out.copy_from_slice(&crate::elem::pack_fixed_str(s, self.len));
                Ok(())
            }
            _ => Err(self.ctx.bad_value(&val)),
        }
    }

    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        rec.put(
            &self.ctx.slot,
            FieldValue::Text(crate::elem::unpack_fixed_str(bytes)),
        );
        Ok(())
    }
}

struct StringFactory;

impl MemberFactory for StringFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::Str { .. })
    }

    fn build(&self, ctx: MemberCtx, kind: &HostKind) -> Result<Box<dyn MemberEncoder>> {
        match kind {
            HostKind::Str { len } => Ok(Box::new(StringEncoder { ctx, len: *len })),
            _ => Err(err(ErrorKind::TypeMismatch(format!("not a string: {kind:?}")))),
        }
    }

    fn kind_for_disk(&self, ty: &Datatype, _variant: Option<TypeVariant>) -> Option<HostKind> {
        match ty {
            Datatype::FixedString { len, .. } => Some(HostKind::Str { len: *len }),
            _ => None,
        }
    }
}

// Enumerations: name or ordinal in, name out.

struct EnumEncoder {
    ctx: MemberCtx,
    ty: EnumType,
    storage: Datatype,
}

impl MemberEncoder for EnumEncoder {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn offset(&self) -> usize {
        self.ctx.offset
    }

    fn size(&self) -> usize {
        self.storage.size()
    }

    fn storage_type(&self) -> Datatype {
        self.storage.clone()
    }

    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        let val = match self.ctx.fetch(rec)? {
            Some(v) => v,
            None => return Ok(()),
        };
        let ordinal = match &val {
            FieldValue::Enum(name) => self.ty.ordinal_of(name)? as i64,
            FieldValue::Int32(o) => {
                self.ty.value_of(*o as i64)?;
                *o as i64
            }
            _ => return Err(self.ctx.bad_value(&val)),
        };
        let bytes = crate::registry::encode_ordinals(&self.storage, &[ordinal])?;
        out.copy_from_slice(&bytes);
        Ok(())
    }

    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        let ords = crate::registry::decode_ordinals(&self.storage, bytes)?;
        let ordinal = ords.first().copied().unwrap_or(0);
        rec.put(
            &self.ctx.slot,
            FieldValue::Enum(self.ty.value_of(ordinal)?.to_string()),
        );
        Ok(())
    }
}

struct EnumFactory;

impl MemberFactory for EnumFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::Enum { .. })
    }

    fn build(&self, ctx: MemberCtx, kind: &HostKind) -> Result<Box<dyn MemberEncoder>> {
        match kind {
            HostKind::Enum { ty } => Ok(Box::new(EnumEncoder {
                ctx,
                ty: ty.clone(),
                storage: ty.datatype()?,
            })),
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "not an enumeration: {kind:?}"
            )))),
        }
    }

    fn kind_for_disk(&self, ty: &Datatype, _variant: Option<TypeVariant>) -> Option<HostKind> {
        match ty {
            Datatype::Enumeration { .. } => EnumType::from_datatype("", ty)
                .ok()
                .map(|ty| HostKind::Enum { ty }),
            _ => None,
        }
    }
}

// Bit fields as packed 64-bit words.

struct BitsEncoder {
    ctx: MemberCtx,
    words: usize,
}

impl MemberEncoder for BitsEncoder {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn offset(&self) -> usize {
        self.ctx.offset
    }

    fn size(&self) -> usize {
        self.words * 8
    }

    fn storage_type(&self) -> Datatype {
        Datatype::BitField { words: self.words }
    }

    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        let val = match self.ctx.fetch(rec)? {
            Some(v) => v,
            None => return Ok(()),
        };
        match &val {
            FieldValue::Bits(bf) => {
                let words = bf.to_storage_form_padded(self.words).ok_or_else(|| {
                    err(ErrorKind::ShapeMismatch(format!(
                        "bit field needs {} words, member {} holds {}",
                        bf.word_count(),
                        self.ctx.slot,
                        self.words
                    )))
                })?;
                encode_into(&words, out, Order::Little)
            }
            _ => Err(self.ctx.bad_value(&val)),
        }
    }

    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        let words = decode_vec::<u64>(bytes, Order::Little)?;
        rec.put(
            &self.ctx.slot,
            FieldValue::Bits(BitField::from_storage_form(&words)),
        );
        Ok(())
    }
}

struct BitsFactory;

impl MemberFactory for BitsFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::Bits { .. })
    }

    fn build(&self, ctx: MemberCtx, kind: &HostKind) -> Result<Box<dyn MemberEncoder>> {
        match kind {
            HostKind::Bits { words } => Ok(Box::new(BitsEncoder { ctx, words: *words })),
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "not a bit field: {kind:?}"
            )))),
        }
    }

    fn kind_for_disk(&self, ty: &Datatype, _variant: Option<TypeVariant>) -> Option<HostKind> {
        match ty {
            Datatype::BitField { words } => Some(HostKind::Bits { words: *words }),
            _ => None,
        }
    }
}

// Opaque tagged blobs of a declared size.

struct OpaqueEncoder {
    ctx: MemberCtx,
    tag: String,
    len: usize,
}

impl MemberEncoder for OpaqueEncoder {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn offset(&self) -> usize {
        self.ctx.offset
    }

    fn size(&self) -> usize {
        self.len
    }

    fn storage_type(&self) -> Datatype {
        Datatype::Opaque {
            tag: self.tag.clone(),
            len: self.len,
        }
    }

    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        let val = match self.ctx.fetch(rec)? {
            Some(v) => v,
            None => return Ok(()),
        };
        match &val {
            FieldValue::Blob(b) => {
                if b.len() > self.len {
                    return Err(err(ErrorKind::ShapeMismatch(format!(
                        "{} blob bytes for a {}-byte opaque member",
                        b.len(),
                        self.len
                    ))));
                }
                out[..b.len()].copy_from_slice(b);
                Ok(())
            }
            _ => Err(self.ctx.bad_value(&val)),
        }
    }

    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        rec.put(&self.ctx.slot, FieldValue::Blob(bytes.to_vec()));
        Ok(())
    }
}

struct OpaqueFactory;

impl MemberFactory for OpaqueFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::Opaque { .. })
    }

    fn build(&self, ctx: MemberCtx, kind: &HostKind) -> Result<Box<dyn MemberEncoder>> {
        match kind {
            HostKind::Opaque { tag, len } => Ok(Box::new(OpaqueEncoder {
                ctx,
                tag: tag.clone(),
                len: *len,
            })),
            _ => Err(err(ErrorKind::TypeMismatch(format!("not opaque: {kind:?}")))),
        }
    }

    fn kind_for_disk(&self, ty: &Datatype, _variant: Option<TypeVariant>) -> Option<HostKind> {
        match ty {
            Datatype::Opaque { tag, len } => Some(HostKind::Opaque {
                tag: tag.clone(),
                len: *len,
            }),
            _ => None,
        }
    }
}

// Timestamps: i64 milliseconds since the epoch, variant-tagged.

struct TimeEncoder {
    ctx: MemberCtx,
}

impl MemberEncoder for TimeEncoder {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn offset(&self) -> usize {
        self.ctx.offset
    }

    fn size(&self) -> usize {
        8
    }

    fn storage_type(&self) -> Datatype {
        Datatype::le_int(8, true)
    }

    fn variant(&self) -> Option<TypeVariant> {
        Some(TypeVariant::TimestampMillisecondsSinceEpoch)
    }

    fn byteify(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        let val = match self.ctx.fetch(rec)? {
            Some(v) => v,
            None => return Ok(()),
        };
        match &val {
            FieldValue::Time(ms) | FieldValue::Int64(ms) => {
                put_at(out, 0, *ms, Order::Little);
                Ok(())
            }
            _ => Err(self.ctx.bad_value(&val)),
        }
    }

    fn set_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        rec.put(
            &self.ctx.slot,
            FieldValue::Time(take_at(bytes, 0, Order::Little)),
        );
        Ok(())
    }
}

struct TimeFactory;

impl MemberFactory for TimeFactory {
    fn can_handle(&self, kind: &HostKind) -> bool {
        matches!(kind, HostKind::Timestamp)
    }

    fn build(&self, ctx: MemberCtx, _kind: &HostKind) -> Result<Box<dyn MemberEncoder>> {
        Ok(Box::new(TimeEncoder { ctx }))
    }

    fn kind_for_disk(&self, ty: &Datatype, variant: Option<TypeVariant>) -> Option<HostKind> {
        match (ty, variant) {
            (
                Datatype::Integer { width: 8, .. },
                Some(TypeVariant::TimestampMillisecondsSinceEpoch),
            ) => Some(HostKind::Timestamp),
            _ => None,
        }
    }
}
