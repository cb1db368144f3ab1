// Compound records and their packed layout. A record is one of three
// views: a string-keyed map, a positional list, or a field-bound value
// behind the FieldSource trait (the compile-time stand-in for reflected
// struct access). A CompoundLayout is the ordered list of per-member
// encoders with cumulative offsets; building one consults the member
// factory registry in members.rs.

use std::collections::HashMap;

use sediment_base::{err, BitField, ErrorKind, Result};

use crate::datatype::{CompoundField, Datatype};
use crate::enums::EnumType;
use crate::members::{FactoryRegistry, MemberCtx, MemberEncoder};
use crate::registry::TypeVariant;

/// One field's worth of data, in host form.
#[derive(Clone, PartialEq, Debug)]
pub enum FieldValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    /// An enumeration value by name.
    Enum(String),
    Bits(BitField),
    Blob(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Time(i64),
}

/// How a member addresses its field on a record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Slot {
    Name(String),
    Index(usize),
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Name(n) => write!(f, "{n}"),
            Slot::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// Field access for a concrete record type. `get_field` answers None and
/// `set_field` false for fields the type does not carry; the layout then
/// writes zeroes for them and discards read-back values, so a file schema
/// may be a superset of the host model.
pub trait FieldSource: std::fmt::Debug {
    fn get_field(&self, name: &str) -> Option<FieldValue>;
    fn set_field(&mut self, name: &str, val: FieldValue) -> bool;
}

/// A record under one of the three access views.
#[derive(Debug)]
pub enum Record {
    Mapped(HashMap<String, FieldValue>),
    Listed(Vec<FieldValue>),
    Bound(Box<dyn FieldSource>),
}

impl Record {
    pub fn mapped() -> Record {
        Record::Mapped(HashMap::new())
    }

    pub fn listed() -> Record {
        Record::Listed(Vec::new())
    }

    pub fn bound(src: impl FieldSource + 'static) -> Record {
        Record::Bound(Box::new(src))
    }

    /// Builder-style insert for mapped records.
    pub fn with(mut self, name: &str, val: FieldValue) -> Record {
        if let Record::Mapped(m) = &mut self {
            m.insert(name.to_string(), val);
        }
        self
    }

    /// Builder-style append for listed records.
    pub fn then(mut self, val: FieldValue) -> Record {
        if let Record::Listed(l) = &mut self {
            l.push(val);
        }
        self
    }

    pub fn get(&self, slot: &Slot) -> Option<FieldValue> {
        match (self, slot) {
            (Record::Mapped(m), Slot::Name(n)) => m.get(n).cloned(),
            (Record::Listed(l), Slot::Index(i)) => l.get(*i).cloned(),
            (Record::Bound(b), Slot::Name(n)) => b.get_field(n),
            _ => None,
        }
    }

    /// Stores a value; false means the record cannot hold that slot and
    /// the value was discarded.
    pub fn put(&mut self, slot: &Slot, val: FieldValue) -> bool {
        match (self, slot) {
            (Record::Mapped(m), Slot::Name(n)) => {
                m.insert(n.clone(), val);
                true
            }
            (Record::Listed(l), Slot::Index(i)) => {
                if *i < l.len() {
                    l[*i] = val;
                } else if *i == l.len() {
                    l.push(val);
                } else {
                    return false;
                }
                true
            }
            (Record::Bound(b), Slot::Name(n)) => b.set_field(n, val),
            _ => false,
        }
    }

    /// Name-addressed lookup regardless of view, for mapped and bound
    /// records.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(&Slot::Name(name.to_string()))
    }
}

/// How the byteifyer addresses records: reflected fields, a string-keyed
/// map, or positional entries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessMode {
    Field,
    Map,
    List,
}

/// The host-side kind of one compound member.
#[derive(Clone, PartialEq, Debug)]
pub enum HostKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Fixed-length string of `len` bytes including the terminator.
    Str { len: usize },
    Enum { ty: EnumType },
    /// Packed 64-bit words.
    Bits { words: usize },
    Opaque { tag: String, len: usize },
    /// i64 milliseconds since the epoch, tagged with a type variant.
    Timestamp,
    /// Escape hatch for caller-registered factories.
    Custom(u32),
}

/// A member request: the on-disk member name plus its host kind.
#[derive(Clone, PartialEq, Debug)]
pub struct MemberSpec {
    pub name: String,
    pub kind: HostKind,
}

impl MemberSpec {
    pub fn new(name: impl Into<String>, kind: HostKind) -> MemberSpec {
        MemberSpec {
            name: name.into(),
            kind,
        }
    }

    pub fn int32(name: impl Into<String>) -> MemberSpec {
        MemberSpec::new(name, HostKind::Int32)
    }

    pub fn int64(name: impl Into<String>) -> MemberSpec {
        MemberSpec::new(name, HostKind::Int64)
    }

    pub fn float32(name: impl Into<String>) -> MemberSpec {
        MemberSpec::new(name, HostKind::Float32)
    }

    pub fn float64(name: impl Into<String>) -> MemberSpec {
        MemberSpec::new(name, HostKind::Float64)
    }

    pub fn string(name: impl Into<String>, len: usize) -> MemberSpec {
        MemberSpec::new(name, HostKind::Str { len })
    }

    pub fn timestamp(name: impl Into<String>) -> MemberSpec {
        MemberSpec::new(name, HostKind::Timestamp)
    }
}

/// The packed record layout: per-member encoders with cumulative offsets.
pub struct CompoundLayout {
    members: Vec<Box<dyn MemberEncoder>>,
    size: usize,
    mode: AccessMode,
}

impl std::fmt::Debug for CompoundLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundLayout")
            .field("members", &self.members.len())
            .field("size", &self.size)
            .field("mode", &self.mode)
            .finish()
    }
}

impl CompoundLayout {
    /// Builds a packed layout: each member's offset is the sum of the
    /// preceding members' sizes.
    pub fn build(
        registry: &FactoryRegistry,
        specs: &[MemberSpec],
        mode: AccessMode,
    ) -> Result<CompoundLayout> {
        let mut members: Vec<Box<dyn MemberEncoder>> = Vec::with_capacity(specs.len());
        let mut offset = 0;
        for (i, spec) in specs.iter().enumerate() {
            let ctx = MemberCtx {
                name: spec.name.clone(),
                slot: slot_for(mode, &spec.name, i),
                offset,
                lenient: mode == AccessMode::Field,
            };
            let enc = registry.choose(&spec.kind)?.build(ctx, &spec.kind)?;
            offset += enc.size();
            members.push(enc);
        }
        Ok(CompoundLayout {
            members,
            size: offset,
            mode,
        })
    }

    /// Builds a layout from an on-disk compound type, mapping each member
    /// back to a host kind through the factories' override chain.
    /// `variants` carries per-member type-variant annotations.
    pub(crate) fn from_disk(
        registry: &FactoryRegistry,
        ty: &Datatype,
        variants: &HashMap<String, TypeVariant>,
        mode: AccessMode,
    ) -> Result<CompoundLayout> {
        let (fields, size) = match ty {
            Datatype::Compound { members, size } => (members, *size),
            _ => {
                return Err(err(ErrorKind::TypeMismatch(
                    "dataset does not hold compound records".into(),
                )))
            }
        };
        let mut members: Vec<Box<dyn MemberEncoder>> = Vec::with_capacity(fields.len());
        for (i, f) in fields.iter().enumerate() {
            let kind = registry.kind_for_disk(&f.ty, variants.get(&f.name).copied())?;
            let ctx = MemberCtx {
                name: f.name.clone(),
                slot: slot_for(mode, &f.name, i),
                offset: f.offset,
                lenient: mode == AccessMode::Field,
            };
            members.push(registry.choose(&kind)?.build(ctx, &kind)?);
        }
        Ok(CompoundLayout {
            members,
            size,
            mode,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_offset(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.offset())
    }

    /// The on-disk compound type this layout produces.
    pub fn disk_type(&self) -> Result<Datatype> {
        let members = self
            .members
            .iter()
            .map(|m| CompoundField {
                name: m.name().to_string(),
                offset: m.offset(),
                ty: m.storage_type(),
            })
            .collect();
        Datatype::compound_raw(members, self.size)
    }

    /// Members carrying a semantic annotation, for per-member variant
    /// attributes on the dataset.
    pub(crate) fn member_variants(&self) -> Vec<(String, TypeVariant)> {
        self.members
            .iter()
            .filter_map(|m| m.variant().map(|v| (m.name().to_string(), v)))
            .collect()
    }

    /// Packs one record. A field-bound record missing a member yields a
    /// zero-filled slot of the member's true size.
    pub fn byteify(&self, rec: &Record) -> Result<Vec<u8>> {
        let mut out = vec![0_u8; self.size];
        self.byteify_into(rec, &mut out)?;
        Ok(out)
    }

    pub(crate) fn byteify_into(&self, rec: &Record, out: &mut [u8]) -> Result<()> {
        for m in &self.members {
            m.byteify(rec, &mut out[m.offset()..m.offset() + m.size()])?;
        }
        Ok(())
    }

    pub fn byteify_all(&self, recs: &[Record]) -> Result<Vec<u8>> {
        let mut out = vec![0_u8; self.size * recs.len()];
        for (chunk, rec) in out.chunks_mut(self.size.max(1)).zip(recs) {
            self.byteify_into(rec, chunk)?;
        }
        Ok(out)
    }

    /// Unpacks one record into a fresh map or list, per the access mode.
    pub fn record_from_bytes(&self, bytes: &[u8]) -> Result<Record> {
        let mut rec = match self.mode {
            AccessMode::List => Record::listed(),
            _ => Record::mapped(),
        };
        self.fill_from_bytes(&mut rec, bytes)?;
        Ok(rec)
    }

    /// Unpacks into an existing record; fields the record cannot hold are
    /// discarded.
    pub fn fill_from_bytes(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        if bytes.len() < self.size {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "{} bytes for a {}-byte record",
                bytes.len(),
                self.size
            ))));
        }
        for m in &self.members {
            m.set_from_bytes(rec, &bytes[m.offset()..m.offset() + m.size()])?;
        }
        Ok(())
    }

    pub fn records_from_bytes(&self, bytes: &[u8]) -> Result<Vec<Record>> {
        if self.size == 0 || bytes.len() % self.size != 0 {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "{} bytes is not a whole number of {}-byte records",
                bytes.len(),
                self.size
            ))));
        }
        bytes
            .chunks(self.size)
            .map(|c| self.record_from_bytes(c))
            .collect()
    }
}

fn slot_for(mode: AccessMode, name: &str, index: usize) -> Slot {
    match mode {
        AccessMode::List => Slot::Index(index),
        _ => Slot::Name(name.to_string()),
    }
}
